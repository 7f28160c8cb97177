//! 统计分析接口

use async_trait::async_trait;
use surgence_core::{OverviewStats, RecentActivity, Result, StatusCount};
use surgence_workflow::{DashboardFeed, DateRange};

use crate::client::BackendClient;

impl BackendClient {
    /// 概览统计，日期范围为空时由后端按今天统计
    pub async fn analytics_overview(&self, range: DateRange) -> Result<OverviewStats> {
        range.validate()?;
        let query = [
            ("start_date", range.start.map(|d| d.to_string())),
            ("end_date", range.end.map(|d| d.to_string())),
        ];
        let query: Vec<(&str, String)> = query
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();
        self.get_json_with_query("analytics/overview/", &query).await
    }

    pub async fn analytics_recent_activity(&self) -> Result<RecentActivity> {
        self.get_json("analytics/recent-activity/").await
    }

    pub async fn analytics_status_breakdown(&self) -> Result<Vec<StatusCount>> {
        self.get_json("analytics/status-breakdown/").await
    }
}

#[async_trait]
impl DashboardFeed for BackendClient {
    async fn overview(&self, range: DateRange) -> Result<OverviewStats> {
        self.analytics_overview(range).await
    }

    async fn recent_activity(&self) -> Result<RecentActivity> {
        self.analytics_recent_activity().await
    }

    async fn status_breakdown(&self) -> Result<Vec<StatusCount>> {
        self.analytics_status_breakdown().await
    }
}
