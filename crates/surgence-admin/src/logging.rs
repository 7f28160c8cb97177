//! 日志初始化
//!
//! 设置了 `RUST_LOG` 时以它为准，否则使用配置中的级别。

use anyhow::{anyhow, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 构造过滤器
pub fn build_filter(level: &str, env_override: Option<&str>) -> Result<EnvFilter> {
    let directives = env_override
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(level);

    EnvFilter::try_new(directives).map_err(|e| anyhow!("Invalid log filter {:?}: {}", directives, e))
}

/// 安装全局 subscriber，只能调用一次
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config.level, env.as_deref())?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match config.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    debug!("Logging initialised with format {}", config.format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_wins() {
        let filter = build_filter("info", Some("surgence_workflow=trace")).unwrap();
        assert!(filter.to_string().contains("surgence_workflow=trace"));

        let filter = build_filter("warn", Some("  ")).unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(build_filter("surgence=loud", None).is_err());
    }
}
