//! 轮询刷新控制器
//!
//! 激活后立即拉取一次，之后按固定周期拉取，直到停用。手动刷新和日期切换
//! 会额外触发一次拉取，不会抑制周期性拉取。拉取之间不去重也不取消；每次
//! 拉取携带单调递增的请求序号，较旧的响应晚于较新的响应返回时直接丢弃。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surgence_core::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// 默认刷新周期
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(30);

/// 可被轮询的数据源
#[async_trait]
pub trait RefreshSource: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    async fn fetch(&self) -> Result<Self::Output>;
}

/// 当前展示状态
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// 已发布结果的请求序号，0 表示尚未返回任何结果
    pub token: u64,
    pub data: Option<T>,
    /// 最近一次拉取失败的信息，成功后清空
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self {
            token: 0,
            data: None,
            error: None,
            fetched_at: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.token == 0
    }
}

struct Shared<S: RefreshSource> {
    source: S,
    next_token: AtomicU64,
    fetches: AtomicU64,
    active: AtomicBool,
    tx: watch::Sender<Snapshot<S::Output>>,
}

impl<S: RefreshSource> Shared<S> {
    fn spawn_fetch(self: &Arc<Self>, reason: &'static str) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        debug!("Refresh #{} started ({})", token, reason);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = shared.source.fetch().await;
            shared.publish(token, result);
        });

        token
    }

    fn publish(&self, token: u64, result: Result<S::Output>) {
        if !self.active.load(Ordering::SeqCst) {
            debug!("Refresh #{} finished after deactivation, dropped", token);
            return;
        }

        if let Err(e) = &result {
            warn!("Refresh #{} failed: {}", token, e);
        }

        let published = self.tx.send_if_modified(|snapshot| {
            if token <= snapshot.token {
                return false;
            }
            snapshot.token = token;
            snapshot.fetched_at = Some(Utc::now());
            match result {
                Ok(data) => {
                    snapshot.data = Some(data);
                    snapshot.error = None;
                }
                Err(e) => snapshot.error = Some(e.to_string()),
            }
            true
        });

        if !published {
            debug!("Refresh #{} superseded by a newer response, discarded", token);
        }
    }
}

/// 轮询刷新控制器，drop 即停用
pub struct RefreshController<S: RefreshSource> {
    shared: Arc<Shared<S>>,
    timer: JoinHandle<()>,
    cadence: Duration,
}

impl<S: RefreshSource> RefreshController<S> {
    /// 激活：立即拉取一次，之后每个周期拉取一次
    pub fn activate(source: S, cadence: Duration) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::empty());
        let shared = Arc::new(Shared {
            source,
            next_token: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            active: AtomicBool::new(true),
            tx,
        });

        let timer = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                // interval 的第一次 tick 立即返回
                let mut ticker = tokio::time::interval(cadence);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    shared.spawn_fetch("scheduled");
                }
            }
        });

        info!("Refresh controller activated, cadence {:?}", cadence);
        Self {
            shared,
            timer,
            cadence,
        }
    }

    /// 手动刷新，返回本次请求序号
    pub fn refresh(&self) -> u64 {
        self.shared.spawn_fetch("manual")
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<S::Output>> {
        self.shared.tx.subscribe()
    }

    pub fn latest(&self) -> Snapshot<S::Output> {
        self.shared.tx.borrow().clone()
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// 已发起的拉取次数
    pub fn fetch_count(&self) -> u64 {
        self.shared.fetches.load(Ordering::SeqCst)
    }

    /// 停用：停止计时器，进行中的拉取结果将被丢弃
    pub fn deactivate(self) {
        drop(self);
    }
}

impl<S: RefreshSource> Drop for RefreshController<S> {
    fn drop(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        self.timer.abort();
        debug!("Refresh controller deactivated");
    }
}
