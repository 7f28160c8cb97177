//! 患者与状态接口

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use surgence_core::{
    NewPatient, Patient, PatientCreated, PatientPage, PatientSearch, PatientSummary, Result,
    StatusDefinition,
};
use surgence_workflow::{BoardFeed, PatientSink};
use tracing::info;

use crate::client::BackendClient;

/// 列表接口既可能返回分页对象，也可能直接返回数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatientListResponse {
    Page(PatientPage),
    List(Vec<PatientSummary>),
}

#[derive(Debug, Serialize)]
struct PageQuery {
    page: u32,
    limit: u32,
}

impl BackendClient {
    /// 分页获取患者列表
    pub async fn list_patients(&self, page: u32, limit: u32) -> Result<PatientPage> {
        let query = PageQuery {
            page: page.max(1),
            limit: limit.clamp(1, 100),
        };
        let response: PatientListResponse = self.get_json_with_query("patients/", &query).await?;

        Ok(match response {
            PatientListResponse::Page(page) => page,
            PatientListResponse::List(items) => PatientPage {
                total: items.len() as u64,
                page: 1,
                pages: 1,
                items,
            },
        })
    }

    /// 按姓名、状态、日期或医生搜索
    pub async fn search_patients(&self, search: &PatientSearch) -> Result<Vec<Patient>> {
        self.get_json_with_query("patients/search/", search).await
    }

    /// 按患者编号获取详情
    pub async fn patient(&self, patient_number: &str) -> Result<Patient> {
        let url = self.segment_url("patients/", patient_number)?;
        self.get_json_at(url).await
    }

    /// 新建患者（唯一的写操作）
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<PatientCreated> {
        let created: PatientCreated = self.post_json("patients/", patient).await?;
        info!("Backend created patient {}", created.patient_number);
        Ok(created)
    }

    /// 当日看板数据（公开接口）
    pub async fn today_status_board(&self) -> Result<Vec<PatientSummary>> {
        self.get_json("patients/today-status-board/").await
    }

    /// 后端状态字典
    pub async fn statuses(&self) -> Result<Vec<StatusDefinition>> {
        let mut statuses: Vec<StatusDefinition> = self.get_json("status/").await?;
        statuses.sort_by_key(|s| s.order_index);
        Ok(statuses)
    }
}

#[async_trait]
impl PatientSink for BackendClient {
    async fn create_patient(&self, patient: &NewPatient) -> Result<PatientCreated> {
        BackendClient::create_patient(self, patient).await
    }
}

#[async_trait]
impl BoardFeed for BackendClient {
    async fn today(&self) -> Result<Vec<PatientSummary>> {
        self.today_status_board().await
    }

    async fn for_date(&self, date: NaiveDate) -> Result<Vec<PatientSummary>> {
        let search = PatientSearch {
            scheduled_date: Some(date),
            ..Default::default()
        };
        let patients = self.search_patients(&search).await?;
        Ok(patients.into_iter().map(PatientSummary::from).collect())
    }
}
