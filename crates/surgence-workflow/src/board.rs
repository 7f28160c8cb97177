//! 公共手术状态看板
//!
//! 把患者摘要投影为按日序号排列的看板条目，并结合轮询控制器维护所选日期的
//! 最新快照。默认跟随当天，跨过午夜后自动显示新的一天。日期切换需要
//! `NavigateBoardDates` 权限，每次切换都会立即刷新。

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use surgence_core::{PatientSummary, Result};
use tokio::sync::watch;
use tracing::info;

use crate::capabilities::{Capability, CapabilitySet};
use crate::ordinal::{assign_daily_ordinals, calendar_day, Ordinal};
use crate::refresh::{RefreshController, RefreshSource, Snapshot};
use crate::status_display::{display_status, StatusDisplay};

/// 看板数据来源
#[async_trait]
pub trait BoardFeed: Send + Sync + 'static {
    /// 后端的当日看板数据
    async fn today(&self) -> Result<Vec<PatientSummary>>;

    /// 指定日期的患者（需要登录）
    async fn for_date(&self, date: NaiveDate) -> Result<Vec<PatientSummary>>;
}

/// 患者身份信息，仅对有权限的会话可见
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntryIdentity {
    pub patient_number: String,
    pub name: String,
    pub procedure: Option<String>,
    pub surgeon_name: Option<String>,
    pub room_no: Option<String>,
}

/// 看板条目
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardEntry {
    pub ordinal: Ordinal,
    pub status: StatusDisplay,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub identity: Option<EntryIdentity>,
}

/// 某一天的看板快照
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardSnapshot {
    pub date: NaiveDate,
    pub entries: Vec<BoardEntry>,
}

impl BoardSnapshot {
    pub fn is_today(&self, tz: &FixedOffset) -> bool {
        self.date == today_in(tz)
    }
}

pub fn today_in(tz: &FixedOffset) -> NaiveDate {
    calendar_day(Utc::now(), tz)
}

/// 将患者摘要投影为看板条目
///
/// 保留当天的记录以及没有预约时间的记录（后端当日接口不一定返回时间）。
/// 有时间的记录按时间排名，无时间的记录按接口顺序排在其后。
pub fn project(
    summaries: &[PatientSummary],
    date: NaiveDate,
    tz: &FixedOffset,
    caps: &CapabilitySet,
) -> Vec<BoardEntry> {
    let day: Vec<&PatientSummary> = summaries
        .iter()
        .filter(|s| s.scheduled_time.map_or(true, |t| calendar_day(t, tz) == date))
        .collect();

    let timed: Vec<PatientSummary> = day
        .iter()
        .filter(|s| s.scheduled_time.is_some())
        .map(|s| (*s).clone())
        .collect();
    let mut timed_ordinals = assign_daily_ordinals(&timed, tz).into_iter();
    let mut next_untimed = timed.len() as u32;

    let show_identity = caps.allows(Capability::ViewPatientIdentity);
    let mut entries: Vec<BoardEntry> = day
        .into_iter()
        .map(|summary| {
            let ordinal = match summary.scheduled_time {
                Some(_) => timed_ordinals.next().flatten(),
                None => None,
            }
            .unwrap_or_else(|| {
                next_untimed += 1;
                Ordinal(next_untimed)
            });

            BoardEntry {
                ordinal,
                status: display_status(&summary.status),
                scheduled_time: summary.scheduled_time,
                identity: show_identity.then(|| EntryIdentity {
                    patient_number: summary.patient_number.clone(),
                    name: summary.full_name(),
                    procedure: summary.procedure.clone(),
                    surgeon_name: summary.surgeon_name.clone(),
                    room_no: summary.room_no.clone(),
                }),
            }
        })
        .collect();

    entries.sort_by_key(|e| e.ordinal);
    entries
}

/// 看板所选日期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySelection {
    /// 跟随当天
    Today,
    /// 固定某一天
    Date(NaiveDate),
}

impl DaySelection {
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::Today => today,
            Self::Date(date) => *date,
        }
    }
}

type Clock = Arc<dyn Fn(&FixedOffset) -> NaiveDate + Send + Sync>;

/// 看板轮询数据源
pub struct BoardSource<F: BoardFeed> {
    feed: F,
    selection: Arc<RwLock<DaySelection>>,
    caps: CapabilitySet,
    tz: FixedOffset,
    clock: Clock,
}

impl<F: BoardFeed> BoardSource<F> {
    fn selection(&self) -> DaySelection {
        match self.selection.read() {
            Ok(selection) => *selection,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn today(&self) -> NaiveDate {
        (self.clock)(&self.tz)
    }

    /// 当天走公开接口，其他日期走需要登录的搜索接口
    async fn fetch_day(&self, date: NaiveDate) -> Result<BoardSnapshot> {
        let summaries = if date == self.today() {
            self.feed.today().await?
        } else {
            self.feed.for_date(date).await?
        };

        Ok(BoardSnapshot {
            date,
            entries: project(&summaries, date, &self.tz, &self.caps),
        })
    }
}

#[async_trait]
impl<F: BoardFeed> RefreshSource for BoardSource<F> {
    type Output = BoardSnapshot;

    async fn fetch(&self) -> Result<BoardSnapshot> {
        let date = self.selection().resolve(self.today());
        self.fetch_day(date).await
    }
}

/// 状态看板：所选日期 + 轮询控制器
pub struct StatusBoard<F: BoardFeed> {
    controller: RefreshController<BoardSource<F>>,
    selection: Arc<RwLock<DaySelection>>,
    caps: CapabilitySet,
    tz: FixedOffset,
}

impl<F: BoardFeed> StatusBoard<F> {
    /// 激活看板，默认跟随当天
    pub fn activate(feed: F, caps: CapabilitySet, tz: FixedOffset, cadence: Duration) -> Self {
        Self::activate_with_clock(feed, caps, tz, cadence, Arc::new(today_in))
    }

    fn activate_with_clock(
        feed: F,
        caps: CapabilitySet,
        tz: FixedOffset,
        cadence: Duration,
        clock: Clock,
    ) -> Self {
        let selection = Arc::new(RwLock::new(DaySelection::Today));
        let source = BoardSource {
            feed,
            selection: Arc::clone(&selection),
            caps: caps.clone(),
            tz,
            clock,
        };

        Self {
            controller: RefreshController::activate(source, cadence),
            selection,
            caps,
            tz,
        }
    }

    pub fn selection(&self) -> DaySelection {
        self.controller.source().selection()
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selection().resolve(self.controller.source().today())
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.caps
    }

    pub fn timezone(&self) -> &FixedOffset {
        &self.tz
    }

    /// 前后翻页（天）
    pub fn navigate(&self, days: i64) -> Result<NaiveDate> {
        let target = self.selected_date() + ChronoDuration::days(days);
        self.go_to(target)
    }

    /// 回到跟随当天
    pub fn today(&self) -> Result<NaiveDate> {
        self.go_to(self.controller.source().today())
    }

    /// 跳转到指定日期并立即刷新；选中当天时恢复跟随当天
    pub fn go_to(&self, date: NaiveDate) -> Result<NaiveDate> {
        self.caps.require(Capability::NavigateBoardDates)?;
        let selection = if date == self.controller.source().today() {
            DaySelection::Today
        } else {
            DaySelection::Date(date)
        };
        {
            let mut selected = match self.selection.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *selected = selection;
        }
        info!("Status board date changed to {}", date);
        self.controller.refresh();
        Ok(date)
    }

    /// 单次获取某一天的看板，不改变所选日期
    pub async fn fetch_day(&self, date: NaiveDate) -> Result<BoardSnapshot> {
        self.caps.require(Capability::NavigateBoardDates)?;
        self.controller.source().fetch_day(date).await
    }

    /// 手动刷新
    pub fn refresh(&self) -> u64 {
        self.controller.refresh()
    }

    pub fn latest(&self) -> Snapshot<BoardSnapshot> {
        self.controller.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<BoardSnapshot>> {
        self.controller.subscribe()
    }

    pub fn deactivate(self) {
        self.controller.deactivate();
    }
}
