//! # Surgence 后端客户端
//!
//! 对后端 HTTP 接口的薄封装，包括：
//! - 患者列表、搜索、详情与新建
//! - 当日看板与状态字典
//! - 统计分析接口
//! - 登录与会话文件
//! - 聊天（JSON 与事件流两种响应）
//!
//! 不做缓存，也不自动重试。

pub mod analytics;
pub mod chat;
pub mod client;
pub mod patients;
pub mod session;

pub use chat::{
    ChatClient, ChatFrame, ChatFrameStatus, ChatMessage, ChatStatus, Conversation, Sender,
    SseDecoder, FALLBACK_ERROR_MESSAGE,
};
pub use client::{BackendClient, ClientConfig};
pub use session::SessionStore;
