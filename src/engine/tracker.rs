// src/engine/tracker.rs

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::client::ad_client::AdBackend;
use crate::model::campaign::{Campaign, CampaignId};

/// 在新的浏览上下文中打开广告落地页（noopener、noreferrer）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: String,
    pub target: &'static str,
    pub features: &'static str,
}

impl NavigationRequest {
    pub fn new_context(url: &str) -> Self {
        Self {
            url: url.to_string(),
            target: "_blank",
            features: "noopener,noreferrer",
        }
    }
}

pub trait LinkOpener: Send + Sync {
    fn open(&self, request: &NavigationRequest);
}

/// 没有真实浏览器时只记录日志
pub struct LoggingOpener;

impl LinkOpener for LoggingOpener {
    fn open(&self, request: &NavigationRequest) {
        info!(url = %request.url, target = request.target, features = request.features, "opening advertisement target");
    }
}

/// 用户对广告内容区的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Click,
    /// 聚焦时的按键，取 `KeyboardEvent.key` 的值
    Key(String),
}

impl Interaction {
    /// 点击或 Enter/空格 触发
    pub fn activates(&self) -> bool {
        match self {
            Interaction::Click => true,
            Interaction::Key(key) => key == "Enter" || key == " ",
        }
    }
}

/// 曝光/点击上报。曝光按广告 id 在本次挂载内去重。
pub struct AdTracker {
    backend: Arc<dyn AdBackend>,
    opener: Arc<dyn LinkOpener>,
    viewed: Mutex<HashSet<CampaignId>>,
}

impl AdTracker {
    pub fn new(backend: Arc<dyn AdBackend>, opener: Arc<dyn LinkOpener>) -> Self {
        Self {
            backend,
            opener,
            viewed: Mutex::new(HashSet::new()),
        }
    }

    /// 首次展示时上报曝光（后台任务，不阻塞渲染，失败不重试）。返回是否发起了上报。
    pub fn track_view(&self, id: CampaignId) -> bool {
        let first_view = self
            .viewed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id);
        if !first_view {
            return false;
        }
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(e) = backend.track_view(id).await {
                error!(campaign_id = %id, error = %e, "Failed to track ad view");
            }
        });
        true
    }

    pub fn has_viewed(&self, id: CampaignId) -> bool {
        self.viewed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&id)
    }

    /// 上报点击后打开落地页；上报失败不影响跳转
    pub async fn handle_click(&self, campaign: &Campaign) -> Option<NavigationRequest> {
        if let Err(e) = self.backend.track_click(campaign.id).await {
            error!(campaign_id = %campaign.id, error = %e, "Failed to track ad click");
        }
        let request = NavigationRequest::new_context(campaign.target_url()?);
        self.opener.open(&request);
        Some(request)
    }

    /// 处理内容区的点击/按键；未触发时返回 None
    pub async fn interact(&self, campaign: &Campaign, interaction: &Interaction) -> Option<NavigationRequest> {
        if !interaction.activates() {
            return None;
        }
        self.handle_click(campaign).await
    }
}
