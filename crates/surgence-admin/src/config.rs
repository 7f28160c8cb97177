//! 配置管理
//!
//! 配置来源依次为：内置默认值、可选的 TOML 文件、`SURGENCE__` 前缀的环境变量。

use anyhow::{Context, Result};
use chrono::FixedOffset;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use surgence_client::ClientConfig;
use tokio::sync::RwLock;
use tracing::{error, info};

const ENV_PREFIX: &str = "SURGENCE";
const ENV_SEPARATOR: &str = "__";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: Arc<RwLock<SurgenceConfig>>,
}

/// 完整配置
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SurgenceConfig {
    pub api: ApiConfig,
    pub board: BoardConfig,
    pub web: WebConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// 后端接口配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// 看板配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    /// 轮询间隔（秒）
    pub refresh_interval_secs: u64,
    /// 判定"同一天"所用的时区偏移（分钟）
    pub utc_offset_minutes: i32,
}

/// 看板 Web 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// 查询其他日期时请求需携带的 Bearer token，不配置则只提供当前看板
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub path: PathBuf,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令
    pub level: String,
    /// 输出格式：full 或 compact
    pub format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            utc_offset_minutes: 0,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            access_token: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".surgence/session.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl SurgenceConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.board.refresh_interval_secs)
    }

    /// 看板时区
    pub fn board_timezone(&self) -> Result<FixedOffset> {
        self.board
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| {
                format!("Invalid board UTC offset: {} minutes", self.board.utc_offset_minutes)
            })
    }

    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.web.host, self.web.port)
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&SurgenceConfig) -> Result<()>,
    error_message: &'static str,
}

impl ConfigManager {
    /// 加载并验证配置
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Self::load_config(config_path, None)?;
        ConfigValidator::new().validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 从文件和环境变量加载
    ///
    /// `env` 为 `None` 时读取进程环境变量。
    pub fn load_config(
        config_path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<SurgenceConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let config: SurgenceConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    pub async fn get_config(&self) -> SurgenceConfig {
        self.config.read().await.clone()
    }

}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "api.base_url",
                validator: |config| {
                    let url = config.api.base_url.trim();
                    if url.is_empty() {
                        Err(anyhow::anyhow!("Backend base URL cannot be empty"))
                    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
                        Err(anyhow::anyhow!("Backend base URL must start with http:// or https://"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid backend base URL",
            },
            ValidationRule {
                field_path: "board.refresh_interval_secs",
                validator: |config| {
                    if config.board.refresh_interval_secs == 0 {
                        Err(anyhow::anyhow!("Refresh interval cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid refresh interval",
            },
            ValidationRule {
                field_path: "board.utc_offset_minutes",
                validator: |config| config.board_timezone().map(|_| ()),
                error_message: "Invalid board timezone",
            },
            ValidationRule {
                field_path: "web.port",
                validator: |config| {
                    if config.web.port == 0 {
                        Err(anyhow::anyhow!("Web port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid web port",
            },
        ];

        Self { validation_rules }
    }

    pub fn validate(&self, config: &SurgenceConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = ConfigManager::load_config(None, env(&[])).unwrap();
        assert_eq!(config, SurgenceConfig::default());
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.web_addr(), "0.0.0.0:3000");
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_file_then_environment() {
        let path = std::env::temp_dir().join(format!("surgence-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://or.example.org/api\"\n\n[board]\nutc_offset_minutes = -300\n",
        )
        .unwrap();

        let config = ConfigManager::load_config(
            Some(&path),
            env(&[("SURGENCE__BOARD__REFRESH_INTERVAL_SECS", "15")]),
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.api.base_url, "https://or.example.org/api");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.board.refresh_interval_secs, 15);
        assert_eq!(
            config.board_timezone().unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let path = std::env::temp_dir().join("surgence-does-not-exist.toml");
        assert!(ConfigManager::load_config(Some(&path), env(&[])).is_err());
    }

    #[test]
    fn test_validator_rules() {
        let validator = ConfigValidator::new();

        let mut config = SurgenceConfig::default();
        config.board.refresh_interval_secs = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = SurgenceConfig::default();
        config.api.base_url = "  ".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = SurgenceConfig::default();
        config.web.port = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = SurgenceConfig::default();
        config.board.utc_offset_minutes = 24 * 60;
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_huge_offset_from_environment_is_rejected() {
        let config = ConfigManager::load_config(
            None,
            env(&[("SURGENCE__BOARD__UTC_OFFSET_MINUTES", "2147483647")]),
        )
        .unwrap();
        assert!(config.board_timezone().is_err());
        assert!(ConfigValidator::new().validate(&config).is_err());
    }
}
