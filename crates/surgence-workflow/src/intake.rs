//! 患者登记表单
//!
//! 提交前在本地校验必填项和邮箱格式，校验失败不会发出任何请求；
//! 校验通过后只发出一次创建请求，成功后跳转到患者列表。

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use chrono::FixedOffset;
use std::sync::OnceLock;
use surgence_core::{utils::parse_local_datetime, NewPatient, PatientCreated, Result};
use tracing::{info, warn};

/// 创建成功后的跳转目标
pub const PATIENT_LIST_ROUTE: &str = "/patients";

const INVALID_FORM_TOAST: &str = "Please correct the errors in the form.";
const CREATED_TOAST: &str = "Patient added successfully!";

/// 表单字段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IntakeField {
    FirstName,
    LastName,
    Address,
    City,
    State,
    Country,
    Phone,
    Email,
    RoomNo,
    Procedure,
    ScheduledTime,
    SurgeonName,
    Note,
}

impl IntakeField {
    pub const ALL: [IntakeField; 13] = [
        Self::FirstName,
        Self::LastName,
        Self::Address,
        Self::City,
        Self::State,
        Self::Country,
        Self::Phone,
        Self::Email,
        Self::RoomNo,
        Self::Procedure,
        Self::ScheduledTime,
        Self::SurgeonName,
        Self::Note,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Address => "address",
            Self::City => "city",
            Self::State => "state",
            Self::Country => "country",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::RoomNo => "room_no",
            Self::Procedure => "procedure",
            Self::ScheduledTime => "scheduled_time",
            Self::SurgeonName => "surgeon_name",
            Self::Note => "note",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::Address => "Address",
            Self::City => "City",
            Self::State => "State",
            Self::Country => "Country",
            Self::Phone => "Phone Number",
            Self::Email => "Email",
            Self::RoomNo => "Room No",
            Self::Procedure => "Procedure",
            Self::ScheduledTime => "Scheduled Time",
            Self::SurgeonName => "Surgeon's Name",
            Self::Note => "Note",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Self::FirstName
                | Self::LastName
                | Self::Phone
                | Self::Email
                | Self::Procedure
                | Self::ScheduledTime
                | Self::SurgeonName
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

/// 字段级错误
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldErrors(BTreeMap<IntakeField, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: IntakeField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: IntakeField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntakeField, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"\S+@\S+\.\S+").expect("static email pattern"))
}

/// 表单原始输入
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntakeForm {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    pub room_no: String,
    pub procedure: String,
    pub scheduled_time: String,
    pub surgeon_name: String,
    pub note: String,
}

impl IntakeForm {
    pub fn get(&self, field: IntakeField) -> &str {
        match field {
            IntakeField::FirstName => &self.first_name,
            IntakeField::LastName => &self.last_name,
            IntakeField::Address => &self.address,
            IntakeField::City => &self.city,
            IntakeField::State => &self.state,
            IntakeField::Country => &self.country,
            IntakeField::Phone => &self.phone,
            IntakeField::Email => &self.email,
            IntakeField::RoomNo => &self.room_no,
            IntakeField::Procedure => &self.procedure,
            IntakeField::ScheduledTime => &self.scheduled_time,
            IntakeField::SurgeonName => &self.surgeon_name,
            IntakeField::Note => &self.note,
        }
    }

    pub fn set(&mut self, field: IntakeField, value: impl Into<String>) {
        let slot = match field {
            IntakeField::FirstName => &mut self.first_name,
            IntakeField::LastName => &mut self.last_name,
            IntakeField::Address => &mut self.address,
            IntakeField::City => &mut self.city,
            IntakeField::State => &mut self.state,
            IntakeField::Country => &mut self.country,
            IntakeField::Phone => &mut self.phone,
            IntakeField::Email => &mut self.email,
            IntakeField::RoomNo => &mut self.room_no,
            IntakeField::Procedure => &mut self.procedure,
            IntakeField::ScheduledTime => &mut self.scheduled_time,
            IntakeField::SurgeonName => &mut self.surgeon_name,
            IntakeField::Note => &mut self.note,
        };
        *slot = value.into();
    }

    /// 校验并生成创建请求
    ///
    /// 不带时区的预约时间按看板时区 `tz` 理解。
    pub fn validate(&self, tz: &FixedOffset) -> std::result::Result<NewPatient, FieldErrors> {
        let mut errors = FieldErrors::default();

        for field in IntakeField::ALL {
            if field.is_required() && self.get(field).trim().is_empty() {
                errors.insert(field, format!("{} is required.", field.label()));
            }
        }

        let email = self.email.trim();
        if !email.is_empty() && !email_pattern().is_match(email) {
            errors.insert(IntakeField::Email, "Invalid email format.");
        }

        let scheduled_time = parse_local_datetime(&self.scheduled_time, tz);
        if !self.scheduled_time.trim().is_empty() && scheduled_time.is_none() {
            errors.insert(
                IntakeField::ScheduledTime,
                "Scheduled Time must be a valid date and time.",
            );
        }

        match scheduled_time {
            Some(scheduled_time) if errors.is_empty() => Ok(NewPatient {
                first_name: self.first_name.trim().to_string(),
                last_name: self.last_name.trim().to_string(),
                address: self.address.trim().to_string(),
                city: self.city.trim().to_string(),
                state: self.state.trim().to_string(),
                country: self.country.trim().to_string(),
                phone: self.phone.trim().to_string(),
                email: email.to_string(),
                room_no: optional(&self.room_no),
                procedure: self.procedure.trim().to_string(),
                scheduled_time,
                surgeon_name: optional(&self.surgeon_name),
                note: optional(&self.note),
            }),
            _ => Err(errors),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// 创建请求的接收方（通常是后端客户端）
#[async_trait]
pub trait PatientSink: Send + Sync {
    async fn create_patient(&self, patient: &NewPatient) -> Result<PatientCreated>;
}

/// 提交结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntakeOutcome {
    Created {
        patient: PatientCreated,
        navigate_to: &'static str,
        toast: String,
    },
    Invalid {
        errors: FieldErrors,
        toast: String,
    },
    Failed {
        toast: String,
    },
}

impl IntakeOutcome {
    pub fn toast(&self) -> &str {
        match self {
            Self::Created { toast, .. } | Self::Invalid { toast, .. } | Self::Failed { toast } => {
                toast
            }
        }
    }
}

/// 提交表单
pub async fn submit<S>(form: &IntakeForm, tz: &FixedOffset, sink: &S) -> IntakeOutcome
where
    S: PatientSink + ?Sized,
{
    let patient = match form.validate(tz) {
        Ok(patient) => patient,
        Err(errors) => {
            warn!("Intake form rejected with {} field error(s)", errors.len());
            return IntakeOutcome::Invalid {
                errors,
                toast: INVALID_FORM_TOAST.to_string(),
            };
        }
    };

    match sink.create_patient(&patient).await {
        Ok(created) => {
            info!("Patient created: {}", created.patient_number);
            IntakeOutcome::Created {
                patient: created,
                navigate_to: PATIENT_LIST_ROUTE,
                toast: CREATED_TOAST.to_string(),
            }
        }
        Err(e) => {
            warn!("Patient creation failed: {}", e);
            let toast = match e {
                surgence_core::SurgenceError::Api { detail, .. } if !detail.is_empty() => detail,
                _ => "Error adding patient.".to_string(),
            };
            IntakeOutcome::Failed { toast }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use surgence_core::SurgenceError;

    #[derive(Default)]
    struct RecordingSink {
        calls: AtomicUsize,
        last: Mutex<Option<NewPatient>>,
        reject_with: Option<String>,
    }

    #[async_trait]
    impl PatientSink for RecordingSink {
        async fn create_patient(&self, patient: &NewPatient) -> Result<PatientCreated> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(patient.clone());
            if let Some(detail) = &self.reject_with {
                return Err(SurgenceError::Api {
                    status: 403,
                    detail: detail.clone(),
                });
            }
            Ok(PatientCreated {
                patient_number: "P20250801-001".to_string(),
                name: format!("{} {}", patient.first_name, patient.last_name),
                status: "Scheduled".to_string(),
            })
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn complete_form() -> IntakeForm {
        IntakeForm {
            first_name: "Mary".to_string(),
            last_name: "Chen".to_string(),
            address: "12 Elm St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "USA".to_string(),
            phone: "(555) 201-3344".to_string(),
            email: "mary.chen@example.com".to_string(),
            room_no: "".to_string(),
            procedure: "Knee Replacement".to_string(),
            scheduled_time: "2025-08-01T09:30".to_string(),
            surgeon_name: "Dr. Johnson".to_string(),
            note: "  ".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_required_field_never_calls_backend() {
        let sink = RecordingSink::default();
        let mut form = complete_form();
        form.set(IntakeField::Procedure, "   ");

        let outcome = submit(&form, &utc(), &sink).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        match outcome {
            IntakeOutcome::Invalid { errors, toast } => {
                assert_eq!(errors.get(IntakeField::Procedure), Some("Procedure is required."));
                assert_eq!(errors.len(), 1);
                assert_eq!(toast, INVALID_FORM_TOAST);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_well_formed_payload_creates_once_and_navigates() {
        let sink = RecordingSink::default();
        let outcome = submit(&complete_form(), &utc(), &sink).await;

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        match outcome {
            IntakeOutcome::Created { navigate_to, patient, .. } => {
                assert_eq!(navigate_to, PATIENT_LIST_ROUTE);
                assert_eq!(patient.name, "Mary Chen");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let sent = sink.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.room_no, None);
        assert_eq!(sent.note, None);
        assert_eq!(sent.surgeon_name.as_deref(), Some("Dr. Johnson"));
        assert_eq!(sent.scheduled_time.to_rfc3339(), "2025-08-01T09:30:00+00:00");
    }

    #[test]
    fn test_email_format_is_checked() {
        let mut form = complete_form();
        form.email = "mary.chen@example".to_string();
        let errors = form.validate(&utc()).unwrap_err();
        assert_eq!(errors.get(IntakeField::Email), Some("Invalid email format."));

        form.email = String::new();
        let errors = form.validate(&utc()).unwrap_err();
        assert_eq!(errors.get(IntakeField::Email), Some("Email is required."));
    }

    #[test]
    fn test_unparseable_schedule_is_field_error() {
        let mut form = complete_form();
        form.scheduled_time = "next tuesday".to_string();
        let errors = form.validate(&utc()).unwrap_err();
        assert!(errors.get(IntakeField::ScheduledTime).is_some());
    }

    #[test]
    fn test_empty_form_reports_every_required_field() {
        let errors = IntakeForm::default().validate(&utc()).unwrap_err();
        let required = IntakeField::ALL.iter().filter(|f| f.is_required()).count();
        assert_eq!(errors.len(), required);
        assert!(errors.get(IntakeField::Address).is_none());
    }

    #[tokio::test]
    async fn test_backend_rejection_surfaces_detail() {
        let sink = RecordingSink {
            reject_with: Some("Insufficient permissions: Admins only.".to_string()),
            ..Default::default()
        };
        let outcome = submit(&complete_form(), &utc(), &sink).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, IntakeOutcome::Failed { .. }));
        assert_eq!(outcome.toast(), "Insufficient permissions: Admins only.");
    }

    #[test]
    fn test_schedule_is_read_in_board_timezone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let mut form = complete_form();
        form.scheduled_time = "2025-08-01T23:30".to_string();

        let patient = form.validate(&tz).unwrap();
        assert_eq!(patient.scheduled_time.to_rfc3339(), "2025-08-01T21:30:00+00:00");
        assert_eq!(
            crate::ordinal::calendar_day(patient.scheduled_time, &tz),
            chrono::NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
        );

        form.scheduled_time = "2025-08-01T23:30:00+00:00".to_string();
        let patient = form.validate(&tz).unwrap();
        assert_eq!(patient.scheduled_time.to_rfc3339(), "2025-08-01T23:30:00+00:00");
    }

    #[test]
    fn test_field_lookup_by_name() {
        assert_eq!(IntakeField::from_name("surgeon_name"), Some(IntakeField::SurgeonName));
        assert_eq!(IntakeField::from_name("age"), None);
    }
}
