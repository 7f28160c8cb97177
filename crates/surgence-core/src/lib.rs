//! # Surgence Core
//!
//! 手术状态看板的核心模块，提供数据模型、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{Result, SurgenceError};
pub use models::*;
