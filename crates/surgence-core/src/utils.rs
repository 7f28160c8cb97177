//! 通用工具函数

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// 后端与表单可能出现的无时区格式
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// 解析后端返回的时间字符串
///
/// 带时区的 RFC 3339 按原样换算到 UTC；不带时区的视为 UTC。
pub fn parse_flexible_datetime(value: &str) -> Option<DateTime<Utc>> {
    parse_datetime_in(value, &Utc)
}

/// 解析用户输入的时间
///
/// 不带时区的输入按 `tz` 所示的本地时间理解，再换算到 UTC。
pub fn parse_local_datetime(value: &str, tz: &FixedOffset) -> Option<DateTime<Utc>> {
    parse_datetime_in(value, tz)
}

fn parse_datetime_in<Tz: TimeZone>(value: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
}

/// serde 适配：必填时间字段
pub mod flexible_datetime {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_flexible_datetime(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid datetime: {}", raw)))
    }
}

/// serde 适配：可选时间字段
pub mod optional_flexible_datetime {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => super::parse_flexible_datetime(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid datetime: {}", raw))),
        }
    }
}

/// 截断过长文本，用于终端与日志输出
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
