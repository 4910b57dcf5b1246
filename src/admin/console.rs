// src/admin/console.rs

use tracing::{error, info};

use crate::admin::form::CampaignForm;
use crate::client::ad_client::{AdClient, AdFilter};
use crate::error::AdError;
use crate::model::campaign::{Campaign, CampaignId};
use crate::model::placements::Placement;

/// 页面内联提示条
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Error(String),
}

/// 后台广告管理：列表、创建/编辑、启停、删除。失败不自动重试，只写入提示条。
pub struct AdminConsole {
    client: AdClient,
    campaigns: Vec<Campaign>,
    editing: Option<CampaignId>,
    banner: Option<Banner>,
}

impl AdminConsole {
    pub fn new(client: AdClient) -> Self {
        Self {
            client,
            campaigns: Vec::new(),
            editing: None,
            banner: None,
        }
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn editing(&self) -> Option<CampaignId> {
        self.editing
    }

    pub fn popup_ads(&self) -> Vec<Campaign> {
        self.by_placement(Placement::Popup)
    }

    pub fn pinned_fade_ads(&self) -> Vec<Campaign> {
        self.by_placement(Placement::PinnedFade)
    }

    fn by_placement(&self, placement: Placement) -> Vec<Campaign> {
        self.campaigns
            .iter()
            .filter(|c| c.placement == placement)
            .cloned()
            .collect()
    }

    fn fail(&mut self, err: AdError, fallback: &str) {
        error!(error = %err, "{}", fallback);
        self.banner = Some(Banner::Error(err.banner_message(fallback)));
    }

    /// 拉取完整（未过滤）列表；失败时保留旧列表
    pub async fn refresh(&mut self) -> bool {
        match self.client.list(&AdFilter::admin()).await {
            Ok(list) => {
                self.campaigns = list;
                if matches!(self.banner, Some(Banner::Error(_))) {
                    self.banner = None;
                }
                true
            }
            Err(err) => {
                self.fail(err, "Failed to load advertisements.");
                false
            }
        }
    }

    /// 进入编辑状态，返回预填的表单
    pub fn begin_edit(&mut self, id: CampaignId) -> Option<CampaignForm> {
        let form = self
            .campaigns
            .iter()
            .find(|c| c.id == id)
            .map(CampaignForm::from_campaign)?;
        self.editing = Some(id);
        self.banner = None;
        Some(form)
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// 提交表单：编辑中则更新，否则创建
    pub async fn save(&mut self, form: &CampaignForm) -> Option<Campaign> {
        self.banner = None;
        let result = match self.editing {
            Some(id) => self.client.update(id, form).await,
            None => self.client.create(form).await,
        };
        let verb = if self.editing.is_some() { "update" } else { "create" };
        match result {
            Ok(saved) => {
                info!(campaign_id = %saved.id, action = verb, "advertisement saved");
                self.banner = Some(Banner::Success(if self.editing.is_some() {
                    "Advertisement updated successfully.".to_string()
                } else {
                    "Advertisement created successfully.".to_string()
                }));
                self.editing = None;
                self.refresh().await;
                Some(saved)
            }
            Err(err) => {
                self.fail(err, &format!("Failed to {} advertisement.", verb));
                None
            }
        }
    }

    pub async fn toggle_active(&mut self, id: CampaignId) -> Option<Campaign> {
        self.banner = None;
        match self.client.toggle_active(id).await {
            Ok(toggled) => {
                info!(campaign_id = %id, is_active = toggled.is_active, "advertisement toggled");
                self.refresh().await;
                Some(toggled)
            }
            Err(err) => {
                self.fail(err, "Failed to update advertisement status.");
                None
            }
        }
    }

    pub async fn delete(&mut self, id: CampaignId) -> bool {
        self.banner = None;
        match self.client.delete(id).await {
            Ok(()) => {
                info!(campaign_id = %id, "advertisement deleted");
                if self.editing == Some(id) {
                    self.editing = None;
                }
                self.refresh().await;
                true
            }
            Err(err) => {
                self.fail(err, "Failed to delete advertisement.");
                false
            }
        }
    }
}
