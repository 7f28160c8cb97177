//! 仪表盘
//!
//! 概览统计、当日活动和状态分布三个组件并发拉取，单个组件失败不影响其他组件。

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use surgence_core::{OverviewStats, RecentActivity, Result, Role, StatusCount, SurgenceError};
use tracing::warn;

use crate::refresh::RefreshSource;
use crate::status_display::{display_status, StatusDisplay, SurgeryStatus};

/// 统计日期范围，两端都为空表示今天
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn validate(&self) -> Result<()> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(SurgenceError::Validation(
                "Start date cannot be after end date".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// 仪表盘数据来源
#[async_trait]
pub trait DashboardFeed: Send + Sync + 'static {
    async fn overview(&self, range: DateRange) -> Result<OverviewStats>;
    async fn recent_activity(&self) -> Result<RecentActivity>;
    async fn status_breakdown(&self) -> Result<Vec<StatusCount>>;
}

/// 按角色区分的标题
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardHeader {
    pub title: &'static str,
    pub description: &'static str,
}

impl DashboardHeader {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self {
                title: "Admin Dashboard",
                description: "Manage the entire surgery status board system",
            },
            Role::SurgicalTeam => Self {
                title: "Surgical Team Dashboard",
                description: "Monitor your assigned surgeries and patient status",
            },
            Role::Guest => Self {
                title: "Dashboard",
                description: "Welcome to Surgence",
            },
        }
    }
}

/// 状态分布中的一行
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BreakdownRow {
    pub display: StatusDisplay,
    pub count: u64,
}

/// 仪表盘快照
#[derive(Debug, Clone, Serialize, Default)]
pub struct DashboardSnapshot {
    pub overview: Option<OverviewStats>,
    pub activity: Option<RecentActivity>,
    pub breakdown: Option<Vec<BreakdownRow>>,
    /// 失败组件的错误信息
    pub errors: Vec<String>,
}

/// 状态分布按流程顺序排列，未知状态排在最后
pub fn order_breakdown(counts: Vec<StatusCount>) -> Vec<BreakdownRow> {
    let mut rows: Vec<BreakdownRow> = counts
        .into_iter()
        .map(|c| BreakdownRow {
            display: display_status(&c.status),
            count: c.count,
        })
        .collect();

    rows.sort_by_key(|row| {
        row.display
            .status
            .map_or(SurgeryStatus::ALL.len(), |s| s.position())
    });
    rows
}

/// 仪表盘轮询数据源
pub struct DashboardSource<F: DashboardFeed> {
    feed: F,
    range: DateRange,
}

impl<F: DashboardFeed> DashboardSource<F> {
    pub fn new(feed: F, range: DateRange) -> Result<Self> {
        range.validate()?;
        Ok(Self { feed, range })
    }
}

#[async_trait]
impl<F: DashboardFeed> RefreshSource for DashboardSource<F> {
    type Output = DashboardSnapshot;

    async fn fetch(&self) -> Result<DashboardSnapshot> {
        let (overview, activity, breakdown) = tokio::join!(
            self.feed.overview(self.range),
            self.feed.recent_activity(),
            self.feed.status_breakdown(),
        );

        let mut snapshot = DashboardSnapshot::default();
        let mut failures = Vec::new();

        match overview {
            Ok(stats) => snapshot.overview = Some(stats),
            Err(e) => failures.push(("overview", e)),
        }
        match activity {
            Ok(activity) => snapshot.activity = Some(activity),
            Err(e) => failures.push(("recent activity", e)),
        }
        match breakdown {
            Ok(counts) => snapshot.breakdown = Some(order_breakdown(counts)),
            Err(e) => failures.push(("status breakdown", e)),
        }

        if failures.len() == 3 {
            let (_, first) = failures.remove(0);
            return Err(first);
        }

        for (widget, e) in failures {
            warn!("Dashboard widget {} failed: {}", widget, e);
            snapshot.errors.push(format!("{}: {}", widget, e));
        }

        Ok(snapshot)
    }
}
