// src/engine/store.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::client::ad_client::{AdBackend, AdFilter};
use crate::model::campaign::Campaign;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

pub type Snapshot = Arc<Vec<Campaign>>;

/// 广告列表轮询：挂载时立即拉取一次，之后按固定间隔拉取，只保存最新快照。
///
/// 拉取失败保留旧快照。并发请求不去重，按响应到达顺序后到者覆盖。
/// 丢弃句柄会中止轮询任务以及其中所有未完成的请求，卸载后的响应不会再写入。
pub struct CampaignStore {
    snapshot: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl CampaignStore {
    pub fn spawn(backend: Arc<dyn AdBackend>, filter: AdFilter, every: Duration) -> Self {
        let (tx, snapshot) = watch::channel(Arc::new(Vec::new()));
        let task = tokio::spawn(poll_loop(backend, filter, every, Arc::new(tx)));
        Self { snapshot, task }
    }

    pub fn latest(&self) -> Snapshot {
        Arc::clone(&self.snapshot.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }
}

impl Drop for CampaignStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_loop(
    backend: Arc<dyn AdBackend>,
    filter: AdFilter,
    every: Duration,
    tx: Arc<watch::Sender<Snapshot>>,
) {
    // 任务被中止时 JoinSet 随之析构，未完成的请求一并中止
    let mut in_flight = JoinSet::new();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let backend = Arc::clone(&backend);
                let tx = Arc::clone(&tx);
                in_flight.spawn(async move {
                    match backend.list_advertisements(&filter).await {
                        Ok(campaigns) => {
                            debug!(count = campaigns.len(), "advertisement snapshot refreshed");
                            tx.send_replace(Arc::new(campaigns));
                        }
                        Err(e) => error!(error = %e, "Failed to load active advertisements"),
                    }
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }
}
