use std::collections::HashMap;

use tracing::debug;

use crate::origin::{self, OriginOptions};
use crate::registrar::{self, RegistrarOptions};
use crate::scene::Scene;

pub const ADD_ORIGIN: &str = "DrillTable_AddOrigin";
pub const ADD_HOLE: &str = "DrillTable_AddHole";

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// 供界面展示的命令资源：图标、菜单文字、快捷键与提示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResources {
    pub pixmap: &'static str,
    pub menu_text: &'static str,
    pub accel: &'static str,
    pub tooltip: &'static str,
}

/// 两个钻孔表命令共用的默认参数。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillSettings {
    pub origin: OriginOptions,
    pub registrar: RegistrarOptions,
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn resources(&self) -> CommandResources;
    /// 可用性判定，界面在每次调用前重新求值。
    fn is_active(&self, context: &CommandContext<'_>) -> bool;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub scene: &'a mut Scene,
    pub settings: DrillSettings,
}

impl<'a> CommandContext<'a> {
    pub fn new(scene: &'a mut Scene) -> Self {
        Self::with_settings(scene, DrillSettings::default())
    }

    pub fn with_settings(scene: &'a mut Scene, settings: DrillSettings) -> Self {
        Self { scene, settings }
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AddOriginCommand);
        bus.register(AddHoleCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    /// 执行命令；不可用的命令直接拒绝，不会进入 `execute`。
    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(handler) = self.handlers.get(request.name.as_str()) else {
            return CommandResponse::err(format!("未知命令: {}", request.name));
        };
        if !handler.is_active(context) {
            debug!(command = handler.name(), "命令当前不可用");
            return CommandResponse::err(format!("命令当前不可用: {}", request.name));
        }
        handler.execute(request, context)
    }

    pub fn is_active(&self, name: &str, context: &CommandContext<'_>) -> bool {
        self.handlers
            .get(name)
            .is_some_and(|handler| handler.is_active(context))
    }

    pub fn resources(&self, name: &str) -> Option<CommandResources> {
        self.handlers.get(name).map(|handler| handler.resources())
    }

    /// 按名称排序返回已注册命令。
    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

struct AddOriginCommand;

impl CommandHandler for AddOriginCommand {
    fn name(&self) -> &'static str {
        ADD_ORIGIN
    }

    fn resources(&self) -> CommandResources {
        CommandResources {
            pixmap: "origin.svg",
            menu_text: "Add Origin",
            accel: "U",
            tooltip: "Add a new origin and associated drill table.\n\
                      1. Select a vertex on the view.\n\
                      2. Add further circles on the view\n",
        }
    }

    fn is_active(&self, context: &CommandContext<'_>) -> bool {
        origin::can_add_origin(context.scene)
    }

    /// 可选参数：标签前缀，覆盖默认设置。
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let mut options = context.settings.origin.clone();
        if let Some(prefix) = request.args.first() {
            options.label_prefix = prefix.clone();
        }
        match origin::add_origin(context.scene, &options) {
            Ok(id) => CommandResponse::ok(format!("已创建原点 {id}")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct AddHoleCommand;

impl CommandHandler for AddHoleCommand {
    fn name(&self) -> &'static str {
        ADD_HOLE
    }

    fn resources(&self) -> CommandResources {
        CommandResources {
            pixmap: "add-hole.svg",
            menu_text: "Add Hole",
            accel: "H",
            tooltip: "Add a new hole to the view drill table\n\
                      1. Select a circle on the view.\n",
        }
    }

    fn is_active(&self, context: &CommandContext<'_>) -> bool {
        registrar::can_add_hole(context.scene)
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let options = context.settings.registrar;
        match registrar::add_holes(context.scene, &options) {
            Ok(report) if report.registered.is_empty() => {
                CommandResponse::err(format!("未登记任何孔位，失败 {} 条", report.failures.len()))
            }
            Ok(report) => {
                let tags: Vec<&str> = report.tags().collect();
                if report.is_complete() {
                    CommandResponse::ok(format!("已登记孔位: {}", tags.join(", ")))
                } else {
                    CommandResponse::ok(format!(
                        "已登记孔位: {}；跳过 {} 条边",
                        tags.join(", "),
                        report.failures.len()
                    ))
                }
            }
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}
