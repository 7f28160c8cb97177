//! 错误定义模块

use thiserror::Error;

/// 看板系统统一错误类型
#[derive(Error, Debug)]
pub enum SurgenceError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("网络错误: {0}")]
    Http(String),

    #[error("后端返回错误 ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("响应解析错误: {0}")]
    Decode(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("权限错误: {0}")]
    Permission(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("事件流错误: {0}")]
    Stream(String),
}

impl SurgenceError {
    /// 后端拒绝认证（401/403）
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SurgenceError::Api { status: 401 | 403, .. })
    }
}

/// 看板系统统一结果类型
pub type Result<T> = std::result::Result<T, SurgenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_carries_detail() {
        let err = SurgenceError::Api {
            status: 403,
            detail: "Insufficient permissions: Admins only.".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("Admins only"));
    }

    #[test]
    fn test_not_found_is_not_unauthorized() {
        let err = SurgenceError::Api {
            status: 404,
            detail: "Patient not found".to_string(),
        };
        assert!(!err.is_unauthorized());
    }
}
