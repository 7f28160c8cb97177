//! 每日序号计算
//!
//! 序号是同一自然日内按预约时间升序的排名（从 1 开始），展示为 "P001"。
//! 预约时间相同时依次按患者编号、输入位置排序，保证序号不重复。
//! 单次计算为 O(n) 扫描，只适用于单日规模的数据，不是通用排名工具。

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use surgence_core::{Patient, PatientSummary};

/// 带预约时间的记录
pub trait Scheduled {
    fn scheduled_time(&self) -> Option<DateTime<Utc>>;

    /// 次级排序键
    fn identifier(&self) -> &str;
}

impl Scheduled for PatientSummary {
    fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        self.scheduled_time
    }

    fn identifier(&self) -> &str {
        &self.patient_number
    }
}

impl Scheduled for Patient {
    fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        Some(self.scheduled_time)
    }

    fn identifier(&self) -> &str {
        &self.patient_number
    }
}

/// 每日序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ordinal(pub u32);

impl Ordinal {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Ordinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{:03}", self.0)
    }
}

impl Serialize for Ordinal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 记录在指定时区下的自然日
pub fn calendar_day<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    time.with_timezone(tz).date_naive()
}

fn compare_keys(
    a: (DateTime<Utc>, &str, usize),
    b: (DateTime<Utc>, &str, usize),
) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.cmp(b.1))
        .then_with(|| a.2.cmp(&b.2))
}

/// 计算目标记录的每日序号
///
/// `target` 可以是 `records` 中的元素，也可以是尚未入列的新记录（此时视为
/// 排在同键记录之后）。目标没有预约时间时返回 `None`。
pub fn daily_ordinal<R, Tz>(records: &[R], target: &R, tz: &Tz) -> Option<Ordinal>
where
    R: Scheduled,
    Tz: TimeZone,
{
    let target_time = target.scheduled_time()?;
    let target_day = calendar_day(target_time, tz);
    let target_index = records
        .iter()
        .position(|r| std::ptr::eq(r, target))
        .unwrap_or(records.len());
    let target_key = (target_time, target.identifier(), target_index);

    let ahead = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| record.scheduled_time().map(|t| (index, record, t)))
        .filter(|(_, _, time)| calendar_day(*time, tz) == target_day)
        .filter(|(index, record, time)| {
            compare_keys((*time, record.identifier(), *index), target_key) == Ordering::Less
        })
        .count();

    Some(Ordinal(ahead as u32 + 1))
}

/// 为整批记录分配每日序号，结果与输入一一对应
pub fn assign_daily_ordinals<R, Tz>(records: &[R], tz: &Tz) -> Vec<Option<Ordinal>>
where
    R: Scheduled,
    Tz: TimeZone,
{
    let mut by_day: HashMap<NaiveDate, Vec<(DateTime<Utc>, &str, usize)>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        if let Some(time) = record.scheduled_time() {
            by_day
                .entry(calendar_day(time, tz))
                .or_default()
                .push((time, record.identifier(), index));
        }
    }

    let mut ordinals = vec![None; records.len()];
    for keys in by_day.values_mut() {
        keys.sort_by(|a, b| compare_keys(*a, *b));
        for (rank, (_, _, index)) in keys.iter().enumerate() {
            ordinals[*index] = Some(Ordinal(rank as u32 + 1));
        }
    }

    ordinals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn summary(number: &str, time: &str) -> PatientSummary {
        PatientSummary {
            patient_number: number.to_string(),
            first_name: "Test".to_string(),
            last_name: number.to_string(),
            status: "scheduled".to_string(),
            email: None,
            phone: None,
            room_no: None,
            procedure: None,
            scheduled_time: surgence_core::utils::parse_flexible_datetime(time),
            surgeon_name: None,
        }
    }

    #[test]
    fn test_ordinal_display_is_zero_padded() {
        assert_eq!(Ordinal(1).to_string(), "P001");
        assert_eq!(Ordinal(42).to_string(), "P042");
        assert_eq!(Ordinal(1200).to_string(), "P1200");
    }

    #[test]
    fn test_earliest_of_day_is_first() {
        let records = vec![
            summary("A", "2025-08-01T11:00:00Z"),
            summary("B", "2025-08-01T07:00:00Z"),
            summary("C", "2025-08-02T06:00:00Z"),
        ];
        assert_eq!(daily_ordinal(&records, &records[1], &Utc), Some(Ordinal(1)));
        assert_eq!(daily_ordinal(&records, &records[0], &Utc), Some(Ordinal(2)));
        // 其他日期不计入
        assert_eq!(daily_ordinal(&records, &records[2], &Utc), Some(Ordinal(1)));
    }

    #[test]
    fn test_distinct_times_produce_contiguous_ordinals() {
        let records = vec![
            summary("A", "2025-08-01T13:30:00Z"),
            summary("B", "2025-08-01T08:00:00Z"),
            summary("C", "2025-08-01T09:45:00Z"),
            summary("D", "2025-08-01T17:00:00Z"),
        ];
        let mut values: Vec<u32> = records
            .iter()
            .map(|r| daily_ordinal(&records, r, &Utc).unwrap().value())
            .collect();
        values.sort();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_equal_times_break_ties_by_identifier() {
        let records = vec![
            summary("P-0002", "2025-08-01T08:00:00Z"),
            summary("P-0001", "2025-08-01T08:00:00Z"),
            summary("P-0001", "2025-08-01T08:00:00Z"),
        ];
        assert_eq!(daily_ordinal(&records, &records[1], &Utc), Some(Ordinal(1)));
        assert_eq!(daily_ordinal(&records, &records[2], &Utc), Some(Ordinal(2)));
        assert_eq!(daily_ordinal(&records, &records[0], &Utc), Some(Ordinal(3)));

        let batch = assign_daily_ordinals(&records, &Utc);
        assert_eq!(batch, vec![Some(Ordinal(3)), Some(Ordinal(1)), Some(Ordinal(2))]);
    }

    #[test]
    fn test_day_boundary_follows_timezone() {
        // 23:30 UTC 在 UTC+2 时区已是次日
        let records = vec![
            summary("A", "2025-08-01T23:30:00Z"),
            summary("B", "2025-08-02T06:00:00Z"),
        ];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(daily_ordinal(&records, &records[1], &Utc), Some(Ordinal(1)));
        assert_eq!(daily_ordinal(&records, &records[1], &plus_two), Some(Ordinal(2)));
    }

    #[test]
    fn test_target_outside_collection_ranks_after_equal_keys() {
        let records = vec![
            summary("A", "2025-08-01T08:00:00Z"),
            summary("B", "2025-08-01T10:00:00Z"),
        ];
        let new_record = summary("A", "2025-08-01T08:00:00Z");
        assert_eq!(daily_ordinal(&records, &new_record, &Utc), Some(Ordinal(2)));
    }

    #[test]
    fn test_unscheduled_records_have_no_ordinal() {
        let mut unscheduled = summary("X", "2025-08-01T08:00:00Z");
        unscheduled.scheduled_time = None;
        let records = vec![unscheduled, summary("Y", "2025-08-01T09:00:00Z")];
        assert_eq!(daily_ordinal(&records, &records[0], &Utc), None);
        assert_eq!(assign_daily_ordinals(&records, &Utc), vec![None, Some(Ordinal(1))]);
    }
}
