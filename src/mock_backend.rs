use axum::routing::{get, patch, post, put};
use axum::{serve, Router};
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::ops::Range;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::api::handlers;
use crate::error::Result;
use crate::model::campaign::{Campaign, CampaignId};
use crate::model::placements::{Placement, Platform, Position};

/// 曝光/点击计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub views: u64,
    pub clicks: u64,
}

/// 内存中的广告后台，供本地联调和集成测试使用
pub struct MockStore {
    campaigns: RwLock<Vec<Campaign>>,
    counters: RwLock<HashMap<CampaignId, Counters>>,
    /// 模拟处理延迟（毫秒），None 表示不延迟
    latency_ms: Option<Range<u64>>,
}

impl MockStore {
    pub fn new(campaigns: Vec<Campaign>) -> Self {
        Self {
            campaigns: RwLock::new(campaigns),
            counters: RwLock::new(HashMap::new()),
            latency_ms: None,
        }
    }

    /// 预置几条演示数据，并模拟 20 ~ 120 毫秒的处理延迟
    pub fn seeded() -> Self {
        let mut store = Self::new(seed_campaigns());
        store.latency_ms = Some(20..120);
        store
    }

    pub async fn simulate_latency(&self) {
        if let Some(range) = self.latency_ms.clone() {
            let delay_ms = rand::thread_rng().gen_range(range);
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    /// 按 displayOrder、id 排序的快照
    pub fn list(&self) -> Vec<Campaign> {
        let mut list = self
            .campaigns
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        list.sort_by_key(|c| (c.display_order, c.id));
        list
    }

    pub fn get(&self, id: CampaignId) -> Option<Campaign> {
        self.campaigns
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// 分配新 id 并写入；返回写入后的记录
    pub fn insert(&self, build: impl FnOnce(&mut Campaign)) -> Campaign {
        let mut campaigns = self.campaigns.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = campaigns.iter().map(|c| c.id.0).max().unwrap_or(0) + 1;
        let mut campaign = Campaign::new(id, Placement::Popup);
        build(&mut campaign);
        campaign.id = CampaignId(id);
        campaigns.push(campaign.clone());
        campaign
    }

    /// 修改已有记录；不存在时返回 None
    pub fn modify(&self, id: CampaignId, change: impl FnOnce(&mut Campaign)) -> Option<Campaign> {
        let mut campaigns = self.campaigns.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let campaign = campaigns.iter_mut().find(|c| c.id == id)?;
        change(campaign);
        Some(campaign.clone())
    }

    pub fn remove(&self, id: CampaignId) -> bool {
        let mut campaigns = self.campaigns.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = campaigns.len();
        campaigns.retain(|c| c.id != id);
        campaigns.len() != before
    }

    pub fn record(&self, id: CampaignId, click: bool) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let mut counters = self.counters.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = counters.entry(id).or_default();
        if click {
            entry.clicks += 1;
        } else {
            entry.views += 1;
        }
        true
    }

    pub fn counters(&self, id: CampaignId) -> Counters {
        self.counters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .copied()
            .unwrap_or_default()
    }
}

fn seed_campaigns() -> Vec<Campaign> {
    let now = Utc::now();
    let mut welcome = Campaign::new(1, Placement::Popup);
    welcome.title = Some("Hiring this week".into());
    welcome.description = Some("Post a job and reach local candidates.".into());
    welcome.business_name = Some("Marketplace".into());
    welcome.target_url = Some("https://example.com/post-a-job".into());
    welcome.is_dismissible = true;

    let mut cafe = Campaign::new(2, Placement::PinnedFade);
    cafe.position = Position::BottomLeft;
    cafe.title = Some("Corner Cafe".into());
    cafe.business_name = Some("Corner Cafe".into());
    cafe.fade_duration_seconds = Some(6.0);
    cafe.display_order = 1;

    let mut gym = Campaign::new(3, Placement::PinnedFade);
    gym.position = Position::HomeBelowHeader;
    gym.title = Some("Open Gym".into());
    gym.description = Some("First month free".into());
    gym.platform = Platform::Web;
    gym.display_order = 2;
    gym.file_url = Some("/uploads/gym.mp4".into());

    let mut expired = Campaign::new(4, Placement::Popup);
    expired.title = Some("Spring sale".into());
    expired.end_date = Some(now - ChronoDuration::days(1));

    vec![welcome, cafe, gym, expired]
}

/// `/api/advertisements` 路由
pub fn router(store: Arc<MockStore>) -> Router {
    Router::new()
        .route("/api/advertisements", get(handlers::list_advertisements).post(handlers::create_advertisement))
        .route(
            "/api/advertisements/{id}",
            put(handlers::update_advertisement).delete(handlers::delete_advertisement),
        )
        .route("/api/advertisements/{id}/toggle-active", patch(handlers::toggle_active))
        .route("/api/advertisements/{id}/track-view", post(handlers::track_view))
        .route("/api/advertisements/{id}/track-click", post(handlers::track_click))
        .with_state(store)
}

/// 绑定地址并在后台提供服务；端口传 0 时由系统分配
pub async fn bind(addr: &str, store: Arc<MockStore>) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = router(store);
    let server = tokio::spawn(async move {
        if let Err(e) = serve(listener, app).await {
            error!(error = %e, "mock advertisement backend stopped");
        }
    });
    info!("Mock advertisement backend running at http://{}", local);
    Ok((local, server))
}

/// 启动带演示数据的 mock 后台
pub async fn start_mock_backend_server(port: u16) -> Result<(SocketAddr, JoinHandle<()>)> {
    bind(&format!("0.0.0.0:{}", port), Arc::new(MockStore::seeded())).await
}
