//! 手术状态展示映射
//!
//! 将后端返回的原始状态字符串映射为标签、颜色、图标和说明文字。
//! 未知状态不报错，退化为中性灰色并直接使用原始字符串作为标签。

use serde::{Deserialize, Serialize};

/// 手术流程阶段（按展示顺序）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum SurgeryStatus {
    Scheduled,    // 已预约
    CheckedIn,    // 已签到
    PreProcedure, // 术前准备
    InProgress,   // 手术中
    Closing,      // 缝合收尾
    Recovery,     // 复苏
    Complete,     // 复苏完成
    Dismissal,    // 转出/离院
}

impl SurgeryStatus {
    pub const ALL: [SurgeryStatus; 8] = [
        SurgeryStatus::Scheduled,
        SurgeryStatus::CheckedIn,
        SurgeryStatus::PreProcedure,
        SurgeryStatus::InProgress,
        SurgeryStatus::Closing,
        SurgeryStatus::Recovery,
        SurgeryStatus::Complete,
        SurgeryStatus::Dismissal,
    ];

    /// 规范化键名
    pub fn key(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::CheckedIn => "checked-in",
            Self::PreProcedure => "pre-procedure",
            Self::InProgress => "in-progress",
            Self::Closing => "closing",
            Self::Recovery => "recovery",
            Self::Complete => "complete",
            Self::Dismissal => "dismissal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::CheckedIn => "Checked In",
            Self::PreProcedure => "Pre-Procedure",
            Self::InProgress => "In-Progress",
            Self::Closing => "Closing",
            Self::Recovery => "Recovery",
            Self::Complete => "Complete",
            Self::Dismissal => "Dismissal",
        }
    }

    pub fn color(&self) -> ColorToken {
        match self {
            Self::Scheduled => ColorToken::Blue,
            Self::CheckedIn => ColorToken::Green,
            Self::PreProcedure => ColorToken::Yellow,
            Self::InProgress => ColorToken::Red,
            Self::Closing => ColorToken::Orange,
            Self::Recovery => ColorToken::Purple,
            Self::Complete => ColorToken::Emerald,
            Self::Dismissal => ColorToken::Slate,
        }
    }

    pub fn icon(&self) -> IconToken {
        match self {
            Self::Scheduled => IconToken::Calendar,
            Self::CheckedIn | Self::Complete => IconToken::CheckCircle,
            Self::PreProcedure => IconToken::Clock,
            Self::InProgress => IconToken::Activity,
            Self::Closing => IconToken::AlertCircle,
            Self::Recovery => IconToken::Pause,
            Self::Dismissal => IconToken::XCircle,
        }
    }

    /// 面向家属的说明文字
    pub fn message(&self) -> &'static str {
        match self {
            Self::Scheduled => "Procedure scheduled.",
            Self::CheckedIn => "In the facility awaiting their procedure.",
            Self::PreProcedure => "Undergoing surgical preparation.",
            Self::InProgress => "Surgical procedure is underway.",
            Self::Closing => "Surgery completed. The patient is being prepared for recovery.",
            Self::Recovery => "Patient transferred to post-surgery recovery room.",
            Self::Complete => "Recovery completed. Patient awaiting dismissal.",
            Self::Dismissal => {
                "Transferred to a hospital room for an overnight stay, or for outpatient procedures the patient has left the hospital."
            }
        }
    }

    /// 在流程中的位置（从 0 开始），仅用于展示排序
    pub fn position(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// 解析原始状态字符串
    ///
    /// 忽略大小写，空格与下划线等同于连字符，例如 "Checked In"、
    /// "checked_in"、"In-progress" 都能识别。
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_ascii_lowercase()
            .split(|c: char| c == ' ' || c == '_' || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        match normalized.as_str() {
            "scheduled" => Some(Self::Scheduled),
            "checked-in" | "checkedin" => Some(Self::CheckedIn),
            "pre-procedure" | "preprocedure" => Some(Self::PreProcedure),
            "in-progress" | "inprogress" => Some(Self::InProgress),
            "closing" => Some(Self::Closing),
            "recovery" => Some(Self::Recovery),
            "complete" | "completed" => Some(Self::Complete),
            "dismissal" | "dismissed" => Some(Self::Dismissal),
            _ => None,
        }
    }
}

impl std::fmt::Display for SurgeryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 颜色标记
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColorToken {
    Blue,
    Green,
    Yellow,
    Red,
    Orange,
    Purple,
    Emerald,
    Slate,
    /// 未知状态使用的中性色
    Neutral,
}

impl ColorToken {
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Blue => "#3b82f6",
            Self::Green => "#22c55e",
            Self::Yellow => "#eab308",
            Self::Red => "#ef4444",
            Self::Orange => "#f97316",
            Self::Purple => "#a855f7",
            Self::Emerald => "#10b981",
            Self::Slate => "#475569",
            Self::Neutral => "#9ca3af",
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Self::Neutral)
    }
}

/// 图标标记
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IconToken {
    Calendar,
    CheckCircle,
    Clock,
    Activity,
    AlertCircle,
    Pause,
    XCircle,
    Info,
}

impl IconToken {
    /// 终端输出使用的字形
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Calendar => "▣",
            Self::CheckCircle => "✓",
            Self::Clock => "◷",
            Self::Activity => "♥",
            Self::AlertCircle => "!",
            Self::Pause => "‖",
            Self::XCircle => "✕",
            Self::Info => "?",
        }
    }
}

/// 状态展示信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusDisplay {
    pub status: Option<SurgeryStatus>,
    pub label: String,
    pub color: ColorToken,
    pub icon: IconToken,
    pub message: String,
}

impl From<SurgeryStatus> for StatusDisplay {
    fn from(status: SurgeryStatus) -> Self {
        Self {
            status: Some(status),
            label: status.label().to_string(),
            color: status.color(),
            icon: status.icon(),
            message: status.message().to_string(),
        }
    }
}

pub const UNKNOWN_STATUS_MESSAGE: &str = "Status update in progress.";

/// 将原始状态映射为展示信息
pub fn display_status(raw: &str) -> StatusDisplay {
    match SurgeryStatus::parse(raw) {
        Some(status) => status.into(),
        None => {
            tracing::debug!("Unmapped surgery status: {:?}", raw);
            StatusDisplay {
                status: None,
                label: raw.to_string(),
                color: ColorToken::Neutral,
                icon: IconToken::Info,
                message: UNKNOWN_STATUS_MESSAGE.to_string(),
            }
        }
    }
}

/// 状态图例（按流程顺序）
pub fn legend() -> Vec<StatusDisplay> {
    SurgeryStatus::ALL.iter().copied().map(StatusDisplay::from).collect()
}
