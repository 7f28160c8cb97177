//! # Surgence 工作流模块
//!
//! 看板前端的派生视图与状态同步逻辑，包括：
//! - 状态展示映射：原始状态字符串到标签、颜色、图标
//! - 每日序号：同日按预约时间排名
//! - 轮询刷新控制器：定时拉取、手动刷新、丢弃过期响应
//! - 权限解析：由会话角色得到统一的权限集合
//! - 患者登记表单校验与提交
//! - 状态看板与仪表盘

pub mod board;
pub mod capabilities;
pub mod dashboard;
pub mod intake;
pub mod ordinal;
pub mod refresh;
pub mod status_display;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

// 重新导出主要类型
pub use board::{
    project, BoardEntry, BoardFeed, BoardSnapshot, DaySelection, EntryIdentity, StatusBoard,
};
pub use capabilities::{Capability, CapabilitySet, NavItem};
pub use dashboard::{
    BreakdownRow, DashboardFeed, DashboardHeader, DashboardSnapshot, DashboardSource, DateRange,
};
pub use intake::{submit, FieldErrors, IntakeField, IntakeForm, IntakeOutcome, PatientSink};
pub use ordinal::{assign_daily_ordinals, daily_ordinal, Ordinal, Scheduled};
pub use refresh::{RefreshController, RefreshSource, Snapshot, DEFAULT_CADENCE};
pub use status_display::{display_status, legend, ColorToken, IconToken, StatusDisplay, SurgeryStatus};
