use drilltable_core::document::ObjectId;
use drilltable_core::ledger::TAG_COLUMN;
use drilltable_core::sheet::{CellAddress, LedgerStore};
use drilltable_engine::command::{
    ADD_HOLE, ADD_ORIGIN, CommandBus, CommandContext, CommandRequest, DrillSettings,
};
use drilltable_engine::scene::Scene;
use tracing::info;

use crate::errors::FrontendError;
use crate::icon_locator::{IconLocator, resolve_command_icons};

/// CLI 演示的执行结果，便于测试与调用方检查。
#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub origin: ObjectId,
    pub tags: Vec<String>,
    /// 台账存储内容，含表头，每行 TAG / X / Y / SIZE。
    pub ledger: Vec<[String; 4]>,
    pub annotations: usize,
    /// 删除原点后宿主视图上剩余的修饰线数量。
    pub lines_after_delete: usize,
}

/// 简易 CLI 演示：在内置视图上创建原点、登记孔位、打印台账，最后删除原点。
pub fn run_demo(
    settings: DrillSettings,
    locator: &IconLocator,
) -> Result<DemoReport, FrontendError> {
    let mut scene = Scene::new();
    let ids = scene.populate_demo();
    let command_bus = CommandBus::new();

    println!("DrillTable CLI 演示");
    println!("支持的命令:");
    for (name, icon) in resolve_command_icons(&command_bus, locator) {
        let Some(resources) = command_bus.resources(name) else {
            continue;
        };
        let icon = icon
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| format!("<未找到 {}>", resources.pixmap));
        println!(
            "  - {name} [{}] 快捷键={}, 图标={icon}",
            resources.menu_text, resources.accel
        );
    }

    let mut context = CommandContext::with_settings(&mut scene, settings);

    context.scene.select_sub_element(ids.view, ids.origin_vertex)?;
    dispatch_cli_command(&command_bus, ADD_ORIGIN, &mut context)?;
    let (origin, _) = context
        .scene
        .document()
        .drill_origins()
        .next()
        .ok_or_else(|| FrontendError::CommandFailed {
            command: ADD_ORIGIN.to_string(),
            message: "未创建原点".to_string(),
        })?;

    // 轮廓边不是圆，会被跳过
    context.scene.clear_selection();
    for hole in ids.holes {
        context.scene.select_sub_element(ids.view, hole)?;
    }
    context.scene.select_sub_element(ids.view, ids.outline)?;
    dispatch_cli_command(&command_bus, ADD_HOLE, &mut context)?;

    let document = context.scene.document();
    let frame = document.drill_origin(origin)?;
    let tags: Vec<String> = frame.ledger().rows().iter().map(|row| row.tag.clone()).collect();
    let sheet = document.sheet(frame.ledger().store_id())?;
    let ledger: Vec<[String; 4]> = (1..=frame.ledger().last_row_index())
        .map(|row| {
            std::array::from_fn(|column| {
                sheet
                    .get(CellAddress::new(TAG_COLUMN + column as u32, row))
                    .unwrap_or_default()
                    .to_string()
            })
        })
        .collect();

    println!("钻孔表 `{}`:", sheet.label);
    for row in &ledger {
        println!("  {:<6} {:>10} {:>10} {:>8}", row[0], row[1], row[2], row[3]);
    }

    println!("图纸注释:");
    let mut annotations = 0;
    for (id, annotation) in document.annotations() {
        annotations += 1;
        println!(
            "  - {id} `{}` 位置=({:.2}, {:.2}), 字号={}",
            annotation.text,
            annotation.position.x(),
            annotation.position.y(),
            annotation.text_size
        );
    }

    context.scene.remove_object(origin)?;
    let lines_after_delete = context.scene.document().view(ids.view)?.cosmetic_len();
    println!("已删除原点 {origin}，视图剩余修饰线 {lines_after_delete} 条");
    info!(
        origin = origin.get(),
        holes = tags.len(),
        annotations,
        "CLI 演示完成"
    );

    Ok(DemoReport {
        origin,
        tags,
        ledger,
        annotations,
        lines_after_delete,
    })
}

fn dispatch_cli_command(
    bus: &CommandBus,
    name: &str,
    context: &mut CommandContext<'_>,
) -> Result<(), FrontendError> {
    let response = bus.dispatch(&CommandRequest::new(name), context);
    if response.success {
        if let Some(message) = response.message {
            println!("[命令] {message}");
        }
        Ok(())
    } else {
        Err(FrontendError::CommandFailed {
            command: name.to_string(),
            message: response.message.unwrap_or_else(|| "未知错误".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use drilltable_engine::origin::OriginOptions;

    use super::*;

    #[test]
    fn demo_registers_all_circles() {
        let report = run_demo(DrillSettings::default(), &IconLocator::default()).expect("run demo");
        assert_eq!(report.tags, vec!["A1", "A2", "A3"]);
        assert_eq!(report.annotations, 3);
        assert_eq!(report.lines_after_delete, 0);
        assert_eq!(report.ledger.len(), 4);
        assert_eq!(report.ledger[0], ["TAG", "X LOC", "Y LOC", "SIZE"].map(String::from));
        assert_eq!(report.ledger[1], ["A1", "30", "30", "10"].map(String::from));
        assert_eq!(report.ledger[3][3], "6.5");
    }

    #[test]
    fn demo_honours_configured_prefix() {
        let settings = DrillSettings {
            origin: OriginOptions {
                label_prefix: "P".to_string(),
            },
            ..DrillSettings::default()
        };
        let report = run_demo(settings, &IconLocator::default()).expect("run demo");
        assert_eq!(report.tags.first().map(String::as_str), Some("P1"));
    }

    #[test]
    fn invalid_prefix_surfaces_as_command_failure() {
        let settings = DrillSettings {
            origin: OriginOptions {
                label_prefix: String::new(),
            },
            ..DrillSettings::default()
        };
        let err = run_demo(settings, &IconLocator::default()).unwrap_err();
        assert!(matches!(
            err,
            FrontendError::CommandFailed { ref command, .. } if command == ADD_ORIGIN
        ));
    }
}
