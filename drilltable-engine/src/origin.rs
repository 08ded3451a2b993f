use drilltable_core::document::{ObjectId, OriginFrame};
use drilltable_core::geometry::Point2;
use drilltable_core::ledger::Ledger;
use tracing::info;

use crate::axis_marker::AxisMarkerBuilder;
use crate::errors::EngineError;
use crate::lifecycle;
use crate::scene::Scene;

pub const DEFAULT_LABEL_PREFIX: &str = "A";
pub const SHEET_LABEL: &str = "DrillTable";

#[derive(Debug, Clone, PartialEq)]
pub struct OriginOptions {
    pub label_prefix: String,
}

impl Default for OriginOptions {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
        }
    }
}

/// 校验通过后的构造参数。
#[derive(Debug, Clone, Copy)]
struct OriginPlan {
    point: Point2,
    view: ObjectId,
}

/// "添加原点"是否可用：恰好选中一个顶点。
pub fn can_add_origin(scene: &Scene) -> bool {
    scene.selected_vertex_count() == 1
}

fn plan(scene: &Scene, options: &OriginOptions) -> Result<OriginPlan, EngineError> {
    let prefix = options.label_prefix.as_str();
    if prefix.is_empty() || prefix.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(EngineError::construction(format!(
            "label prefix `{prefix}` must be non-empty and must not end with a digit"
        )));
    }

    let vertices = scene.selected_vertices()?;
    let [vertex] = vertices.as_slice() else {
        return Err(EngineError::construction(format!(
            "expected exactly one selected vertex, found {}",
            vertices.len()
        )));
    };
    Ok(OriginPlan {
        point: vertex.point,
        view: vertex.view,
    })
}

/// 以选中顶点创建原点、台账存储与轴标记。
///
/// 先校验后构造：校验失败时文档保持不变。
pub fn add_origin(scene: &mut Scene, options: &OriginOptions) -> Result<ObjectId, EngineError> {
    let plan = plan(scene, options)?;
    let document = scene.document_mut();

    let surface = document.view_mut(plan.view)?;
    let glyph = AxisMarkerBuilder::new()
        .build(plan.point, surface)
        .map_err(|source| EngineError::Construction {
            reason: "failed to draw axis marker".to_string(),
            source: Some(source),
        })?;

    let sheet = document.add_sheet(SHEET_LABEL);
    Ledger::write_header(document.sheet_mut(sheet)?);

    let frame = OriginFrame::new(
        options.label_prefix.clone(),
        plan.point,
        plan.view,
        glyph,
        Ledger::new(sheet),
    );
    let origin = document.add_drill_origin(frame);
    lifecycle::watch_origin(document, origin);
    document.recompute();

    info!(
        origin = origin.get(),
        view = plan.view.get(),
        sheet = sheet.get(),
        x = plan.point.x(),
        y = plan.point.y(),
        "已创建钻孔原点"
    );
    Ok(origin)
}

#[cfg(test)]
mod tests {
    use drilltable_core::sheet::LedgerStore;

    use super::*;
    use crate::axis_marker::SEGMENT_COUNT;
    use crate::scene::DemoEntities;

    fn demo() -> (Scene, DemoEntities) {
        let mut scene = Scene::new();
        let ids = scene.populate_demo();
        (scene, ids)
    }

    #[test]
    fn availability_requires_exactly_one_vertex() {
        let (mut scene, ids) = demo();
        assert!(!can_add_origin(&scene));

        scene.select_sub_element(ids.view, ids.origin_vertex).unwrap();
        scene.select_sub_element(ids.view, ids.holes[0]).unwrap();
        assert!(can_add_origin(&scene));

        scene.select_sub_element(ids.view, ids.corner_vertex).unwrap();
        assert!(!can_add_origin(&scene));
    }

    #[test]
    fn origin_is_created_from_selected_vertex() {
        let (mut scene, ids) = demo();
        scene.select_sub_element(ids.view, ids.origin_vertex).unwrap();
        let generation = scene.document().generation();

        let origin = add_origin(&mut scene, &OriginOptions::default()).expect("add origin");
        let document = scene.document();
        let frame = document.drill_origin(origin).unwrap();
        assert_eq!(frame.origin(), Point2::new(100.0, 50.0));
        assert_eq!(frame.host_view(), ids.view);
        assert_eq!(frame.label_prefix(), "A");
        assert_eq!(frame.glyph_segments().len(), SEGMENT_COUNT);
        assert_eq!(document.view(ids.view).unwrap().cosmetic_len(), SEGMENT_COUNT);
        assert_eq!(document.generation(), generation + 1);
        assert_eq!(document.subscription_count(origin), 1);

        let sheet = document.sheet(frame.ledger().store_id()).unwrap();
        assert_eq!(sheet.label, SHEET_LABEL);
        let header: Vec<_> = ["A1", "B1", "C1", "D1"]
            .iter()
            .map(|cell| sheet.get(cell.parse().unwrap()).unwrap_or_default().to_string())
            .collect();
        assert_eq!(header, vec!["TAG", "X LOC", "Y LOC", "SIZE"]);
        assert_eq!(frame.ledger().last_row_index(), 1);
    }

    #[test]
    fn bad_selection_creates_nothing() {
        let (mut scene, ids) = demo();
        let before = scene.document().objects().count();

        let err = add_origin(&mut scene, &OriginOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Construction { .. }));

        scene.select_sub_element(ids.view, ids.origin_vertex).unwrap();
        scene.select_sub_element(ids.view, ids.corner_vertex).unwrap();
        let err = add_origin(&mut scene, &OriginOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Construction { .. }));

        assert_eq!(scene.document().objects().count(), before);
        assert_eq!(scene.document().view(ids.view).unwrap().cosmetic_len(), 0);
        assert_eq!(scene.document().generation(), 0);
    }

    #[test]
    fn invalid_prefix_is_rejected_before_mutation() {
        let (mut scene, ids) = demo();
        scene.select_sub_element(ids.view, ids.origin_vertex).unwrap();
        for prefix in ["", "H2"] {
            let options = OriginOptions {
                label_prefix: prefix.to_string(),
            };
            let err = add_origin(&mut scene, &options).unwrap_err();
            assert!(matches!(err, EngineError::Construction { .. }));
        }
        assert_eq!(scene.document().drill_origins().count(), 0);
    }

    #[test]
    fn custom_prefix_is_kept() {
        let (mut scene, ids) = demo();
        scene.select_sub_element(ids.view, ids.origin_vertex).unwrap();
        let options = OriginOptions {
            label_prefix: "H".to_string(),
        };
        let origin = add_origin(&mut scene, &options).unwrap();
        let frame = scene.document().drill_origin(origin).unwrap();
        assert_eq!(frame.ledger().next_tag(frame.label_prefix()), "H1");
    }
}
