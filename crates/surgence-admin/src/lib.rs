//! # Surgence 运维模块
//!
//! 配置加载与验证、日志初始化。

pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, BoardConfig, ConfigManager, ConfigValidator, LoggingConfig, SessionConfig,
    SurgenceConfig, WebConfig,
};
pub use logging::{build_filter, init_logging};
