//! 确定性测试数据
//!
//! 同一个种子总是生成相同的患者摘要，只用于测试和演示。

use chrono::{NaiveDate, NaiveTime};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use surgence_core::PatientSummary;

use crate::status_display::SurgeryStatus;

const FIRST_NAMES: &[&str] = &[
    "John", "Mary", "Robert", "Sarah", "Michael", "Jennifer", "William", "Linda", "David",
    "Elizabeth", "Joseph", "Susan", "Thomas", "Karen", "Daniel", "Lisa",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Garcia", "Miller", "Davis", "Martinez",
    "Wilson", "Anderson", "Taylor", "Thompson", "Lee", "Walker",
];

const PROCEDURES: &[&str] = &[
    "Appendectomy", "Hernia Repair", "Knee Replacement", "Hip Replacement", "Cataract Surgery",
    "Coronary Bypass", "Arthroscopy", "Thyroidectomy", "Spinal Fusion", "ACL Repair",
];

const SURGEONS: &[&str] = &[
    "Dr. Johnson", "Dr. Chen", "Dr. Martinez", "Dr. Smith", "Dr. Davis", "Dr. Wilson",
];

/// 07:00 起每半小时一个手术时段
const FIRST_SLOT_MINUTES: u32 = 7 * 60;
const SLOT_COUNT: u32 = 22;

/// 确定性患者摘要生成器
pub struct FixtureBuilder {
    rng: ChaCha8Rng,
    days: Vec<(NaiveDate, usize)>,
}

impl FixtureBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            days: Vec::new(),
        }
    }

    /// 追加某天的 `count` 台手术，时段互不相同（最多 22 台）
    pub fn day(mut self, date: NaiveDate, count: usize) -> Self {
        self.days.push((date, count.min(SLOT_COUNT as usize)));
        self
    }

    /// 生成摘要，输出顺序被打乱
    pub fn build(mut self) -> Vec<PatientSummary> {
        let mut out = Vec::new();

        for (date, count) in std::mem::take(&mut self.days) {
            for slot in 0..count as u32 {
                let minutes = FIRST_SLOT_MINUTES + slot * 30;
                let time = NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
                    .unwrap_or(NaiveTime::MIN);
                let first = pick(&mut self.rng, FIRST_NAMES);
                let last = pick(&mut self.rng, LAST_NAMES);
                let status = SurgeryStatus::ALL[self.rng.gen_range(0..SurgeryStatus::ALL.len())];

                out.push(PatientSummary {
                    patient_number: format!("P{}-{:03}", date.format("%Y%m%d"), slot + 1),
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    status: status.label().to_string(),
                    email: Some(format!(
                        "{}.{}@example.com",
                        first.to_lowercase(),
                        last.to_lowercase()
                    )),
                    phone: Some(format!(
                        "(555) {}-{}",
                        self.rng.gen_range(100..1000),
                        self.rng.gen_range(1000..10000)
                    )),
                    room_no: Some(format!("{}", self.rng.gen_range(100..500))),
                    procedure: Some(pick(&mut self.rng, PROCEDURES).to_string()),
                    scheduled_time: Some(date.and_time(time).and_utc()),
                    surgeon_name: Some(pick(&mut self.rng, SURGEONS).to_string()),
                });
            }
        }

        out.shuffle(&mut self.rng);
        out
    }
}

fn pick<'a>(rng: &mut ChaCha8Rng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}
