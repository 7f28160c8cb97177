//! # Surgence 看板服务
//!
//! 公共手术状态看板的 Web 展示：HTML 页面、JSON 接口、手动刷新与健康检查。
//! 数据由轮询刷新控制器维护，请求处理只读取最新快照。

pub mod handlers;
pub mod html;
pub mod server;

pub use handlers::{ApiError, AppState, BoardView};
pub use server::{router, WebServer};
