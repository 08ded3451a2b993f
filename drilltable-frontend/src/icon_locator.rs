use std::env;
use std::path::{Path, PathBuf};

use drilltable_config::AppConfig;
use drilltable_engine::command::CommandBus;
use tracing::{debug, trace};

pub const ICON_ROOTS_ENV: &str = "DRILLTABLE_ICON_ROOTS";

/// 按优先级在若干目录中查找命令图标。
#[derive(Debug, Clone, Default)]
pub struct IconLocator {
    search_roots: Vec<PathBuf>,
}

impl IconLocator {
    /// 搜索顺序：`base_dir`、配置中的 `icon_roots`、环境变量 `DRILLTABLE_ICON_ROOTS`。
    pub fn from_config(base_dir: Option<&Path>, config: &AppConfig) -> Self {
        let env_roots = env::var_os(ICON_ROOTS_ENV)
            .map(|paths| env::split_paths(&paths).collect::<Vec<_>>())
            .unwrap_or_default();
        Self::from_roots(
            base_dir
                .map(Path::to_path_buf)
                .into_iter()
                .chain(config.resources.icon_roots.iter().cloned())
                .chain(env_roots),
        )
    }

    /// 只保留存在的目录，去重时保持靠前优先级。
    pub fn from_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut deduped: Vec<PathBuf> = Vec::new();
        for root in roots.into_iter().filter(|path| path.is_dir()) {
            if !deduped.iter().any(|existing| existing == &root) {
                deduped.push(root);
            }
        }
        Self {
            search_roots: deduped,
        }
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn resolve(&self, pixmap: &str) -> Option<PathBuf> {
        let raw_path = Path::new(pixmap);
        if raw_path.is_absolute() {
            if raw_path.exists() {
                return Some(Self::canonicalize_or_clone(raw_path));
            }
            debug!(path = %raw_path.display(), "图标路径为绝对路径但未找到对应文件");
            return None;
        }

        for root in &self.search_roots {
            let candidate = root.join(raw_path);
            trace!(candidate = %candidate.display(), "icon locator candidate");
            if candidate.exists() {
                return Some(Self::canonicalize_or_clone(&candidate));
            }
        }
        None
    }

    fn canonicalize_or_clone(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }
}

/// 为每个已注册命令解析图标，按命令名排序。
pub fn resolve_command_icons(
    bus: &CommandBus,
    locator: &IconLocator,
) -> Vec<(&'static str, Option<PathBuf>)> {
    bus.available_commands()
        .into_iter()
        .map(|name| {
            let icon = bus
                .resources(name)
                .and_then(|resources| locator.resolve(resources.pixmap));
            (name, icon)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use drilltable_engine::command::{ADD_HOLE, ADD_ORIGIN};

    use super::*;

    #[test]
    fn earlier_roots_take_priority() {
        let first = tempfile::tempdir().expect("create temp dir");
        let second = tempfile::tempdir().expect("create temp dir");
        fs::write(first.path().join("origin.svg"), "<svg/>").unwrap();
        fs::write(second.path().join("origin.svg"), "<svg/>").unwrap();
        fs::write(second.path().join("add-hole.svg"), "<svg/>").unwrap();

        let locator = IconLocator::from_roots([
            first.path().to_path_buf(),
            second.path().join("missing"),
            second.path().to_path_buf(),
            first.path().to_path_buf(),
        ]);
        assert_eq!(locator.search_roots().len(), 2);

        let origin = locator.resolve("origin.svg").expect("resolve origin icon");
        assert!(origin.starts_with(first.path().canonicalize().unwrap()));
        let hole = locator.resolve("add-hole.svg").expect("resolve hole icon");
        assert!(hole.starts_with(second.path().canonicalize().unwrap()));
        assert!(locator.resolve("unknown.svg").is_none());
    }

    #[test]
    fn command_icons_follow_registered_commands() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("origin.svg"), "<svg/>").unwrap();
        let mut config = AppConfig::default();
        config.resources.icon_roots.push(dir.path().to_path_buf());

        let locator = IconLocator::from_config(None, &config);
        let icons = resolve_command_icons(&CommandBus::new(), &locator);
        assert_eq!(icons.len(), 2);
        assert_eq!(icons[0].0, ADD_HOLE);
        assert!(icons[0].1.is_none());
        assert_eq!(icons[1].0, ADD_ORIGIN);
        assert!(icons[1].1.is_some());
    }
}
