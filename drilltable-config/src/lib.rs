use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "DRILLTABLE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub drill_table: DrillTableConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，加载后立即校验。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `DRILLTABLE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.drill_table.validate()
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 钻孔表默认参数：标签前缀与孔位注释的排版。
#[derive(Debug, Clone, Deserialize)]
pub struct DrillTableConfig {
    #[serde(default = "DrillTableConfig::default_label_prefix")]
    pub label_prefix: String,
    #[serde(default = "DrillTableConfig::default_margin_left")]
    pub annotation_margin_left: f64,
    #[serde(default = "DrillTableConfig::default_text_size")]
    pub annotation_text_size: f64,
}

impl DrillTableConfig {
    fn default_label_prefix() -> String {
        "A".to_string()
    }

    fn default_margin_left() -> f64 {
        8.0
    }

    fn default_text_size() -> f64 {
        3.0
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self.label_prefix.as_str();
        if prefix.is_empty() || prefix.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                field: "drill_table.label_prefix",
                message: format!("标签前缀 `{prefix}` 不能为空，且不能以数字结尾"),
            });
        }
        if !self.annotation_margin_left.is_finite() {
            return Err(ConfigError::Invalid {
                field: "drill_table.annotation_margin_left",
                message: "注释左边距必须是有限数值".to_string(),
            });
        }
        if !(self.annotation_text_size.is_finite() && self.annotation_text_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "drill_table.annotation_text_size",
                message: "注释字号必须是正数".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DrillTableConfig {
    fn default() -> Self {
        Self {
            label_prefix: Self::default_label_prefix(),
            annotation_margin_left: Self::default_margin_left(),
            annotation_text_size: Self::default_text_size(),
        }
    }
}

/// 命令图标的搜索目录。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub icon_roots: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置项 {field} 无效: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
