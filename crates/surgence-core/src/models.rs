//! 核心数据模型定义
//!
//! 与后端 API 的 JSON 结构一一对应，前端只持有只读副本。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{flexible_datetime, optional_flexible_datetime};

/// 患者完整记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub patient_number: String, // 院内患者编号
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    pub procedure: String, // 手术名称
    #[serde(with = "flexible_datetime")]
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub surgeon_id: Option<Uuid>,
    #[serde(default)]
    pub surgeon_name: Option<String>,
    #[serde(default)]
    pub room_no: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub status: String, // 后端状态原始字符串
    #[serde(with = "flexible_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "flexible_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// 患者摘要（列表与看板使用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub patient_number: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub room_no: Option<String>,
    #[serde(default)]
    pub procedure: Option<String>,
    #[serde(default, with = "optional_flexible_datetime")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub surgeon_name: Option<String>,
}

impl PatientSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<Patient> for PatientSummary {
    fn from(patient: Patient) -> Self {
        Self {
            patient_number: patient.patient_number,
            first_name: patient.first_name,
            last_name: patient.last_name,
            status: patient.status,
            email: Some(patient.email),
            phone: Some(patient.phone),
            room_no: patient.room_no,
            procedure: Some(patient.procedure),
            scheduled_time: Some(patient.scheduled_time),
            surgeon_name: patient.surgeon_name,
        }
    }
}

/// 分页患者列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientPage {
    pub items: Vec<PatientSummary>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

/// 新建患者请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    pub room_no: Option<String>,
    pub procedure: String,
    pub scheduled_time: DateTime<Utc>,
    pub surgeon_name: Option<String>,
    pub note: Option<String>,
}

/// 新建患者响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientCreated {
    pub patient_number: String,
    pub name: String,
    pub status: String,
}

/// 患者搜索条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surgeon: Option<String>,
}

impl PatientSearch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.status.is_none()
            && self.scheduled_date.is_none()
            && self.surgeon.is_none()
    }
}

/// 后端状态字典条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDefinition {
    pub status: String,
    pub message: String,
    pub color: String,
    pub order_index: i32,
}

/// 概览统计
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OverviewStats {
    pub new_patients: u64,
    pub surgeries_total: u64,
    pub surgeries_completed: u64,
    pub surgeries_remaining: u64,
    pub avg_wait_time_minutes: f64,
    pub active_cases: u64,
}

/// 状态分布
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

/// 单条状态变更活动
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientActivity {
    pub patient_number: String,
    pub name: String,
    #[serde(default)]
    pub previous_status: Option<String>,
    pub new_status: String,
    #[serde(with = "flexible_datetime")]
    pub changed_at: DateTime<Utc>,
}

/// 当日活动
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecentActivity {
    pub status_changes: Vec<PatientActivity>,
    pub completed_today: Vec<String>,
    pub active_cases: Vec<String>,
}

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Guest,
    Admin,
    SurgicalTeam,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Admin => "admin",
            Role::SurgicalTeam => "surgical_team",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::SurgenceError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "admin" => Ok(Role::Admin),
            "surgical_team" | "surgical-team" => Ok(Role::SurgicalTeam),
            other => Err(crate::SurgenceError::Validation(format!(
                "Unknown role: {}",
                other
            ))),
        }
    }
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub role: Role,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// 当前会话
///
/// 登录时建立，登出时清除，其余位置只读。未登录即为访客会话。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Session {
    pub token: Option<String>,
    pub role: Role,
    pub email: Option<String>,
    pub established_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn from_login(email: &str, response: LoginResponse) -> Self {
        Self {
            token: Some(response.access_token),
            role: response.role,
            email: Some(email.to_string()),
            established_at: Some(Utc::now()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.role != Role::Guest
    }

    /// 展示用名称
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or("Guest User")
    }
}
