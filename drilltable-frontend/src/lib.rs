pub mod cli;
pub mod errors;
pub mod icon_locator;

use drilltable_config::AppConfig;
use drilltable_engine::command::DrillSettings;
use drilltable_engine::origin::OriginOptions;
use drilltable_engine::registrar::RegistrarOptions;
use errors::FrontendError;
use icon_locator::IconLocator;
use tracing::info;

/// 把配置中的钻孔表参数映射为命令默认值。
pub fn settings_from_config(config: &AppConfig) -> DrillSettings {
    let drill_table = &config.drill_table;
    DrillSettings {
        origin: OriginOptions {
            label_prefix: drill_table.label_prefix.clone(),
        },
        registrar: RegistrarOptions {
            margin_left: drill_table.annotation_margin_left,
            text_size: drill_table.annotation_text_size,
        },
    }
}

/// 启动 CLI 演示或返回错误。
pub fn run_cli_demo(config: &AppConfig) -> Result<cli::DemoReport, FrontendError> {
    info!("启动 CLI 演示前端");
    let locator = IconLocator::from_config(None, config);
    cli::run_demo(settings_from_config(config), &locator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_reach_command_settings() {
        let mut config = AppConfig::default();
        config.drill_table.label_prefix = "H".to_string();
        config.drill_table.annotation_margin_left = 4.0;

        let settings = settings_from_config(&config);
        assert_eq!(settings.origin.label_prefix, "H");
        assert_eq!(settings.registrar.margin_left, 4.0);
        assert_eq!(settings.registrar.text_size, 3.0);
    }

    #[test]
    fn default_config_matches_engine_defaults() {
        assert_eq!(
            settings_from_config(&AppConfig::default()),
            DrillSettings::default()
        );
    }
}
