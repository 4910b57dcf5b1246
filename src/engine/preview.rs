// src/engine/preview.rs

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::engine::rotation::{RotationPolicy, RotationState};
use crate::engine::scheduler::RotationHandle;
use crate::model::campaign::{Campaign, CampaignId, MediaSource};
use crate::model::placements::Placement;

pub const TIMER_INFO: &str = "Auto-advance: 30s | Dismiss wait: 1m | Cycle restart: 5m";

/// 预览中当前展示的弹窗
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewCard {
    pub campaign: Campaign,
    pub anchor_class: &'static str,
    pub slide_class: &'static str,
    pub show_close: bool,
    pub media: MediaSource,
    pub heading: String,
    pub body: String,
}

/// 后台弹窗预览：对已激活的弹窗广告按固定时长依次播放
pub struct PreviewSimulator {
    rotation: RotationHandle,
    popups: Vec<Campaign>,
    identity: Vec<CampaignId>,
    media_origin: String,
}

fn active_popups(campaigns: &[Campaign]) -> Vec<Campaign> {
    campaigns
        .iter()
        .filter(|c| c.placement == Placement::Popup && c.is_active)
        .cloned()
        .collect()
}

impl PreviewSimulator {
    pub fn mount(campaigns: &[Campaign], media_origin: impl Into<String>) -> Self {
        let policy = RotationPolicy::preview();
        let popups = active_popups(campaigns);
        let rotation = RotationHandle::spawn(policy.clone(), "preview");
        rotation.set_candidates(policy.displays_for(&popups));
        info!(popups = popups.len(), "popup preview mounted");
        Self {
            identity: popups.iter().map(|c| c.id).collect(),
            popups,
            rotation,
            media_origin: media_origin.into(),
        }
    }

    /// 列表刷新；只有候选集合变化时才重置轮播
    pub fn update_campaigns(&mut self, campaigns: &[Campaign]) -> bool {
        let popups = active_popups(campaigns);
        let identity: Vec<CampaignId> = popups.iter().map(|c| c.id).collect();
        let changed = identity != self.identity;
        if changed {
            info!(popups = popups.len(), "popup preview candidates changed, restarting");
            self.rotation
                .set_candidates(RotationPolicy::preview().displays_for(&popups));
            self.identity = identity;
        }
        self.popups = popups;
        changed
    }

    pub fn popups(&self) -> &[Campaign] {
        &self.popups
    }

    pub fn state(&self) -> RotationState {
        self.rotation.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<RotationState> {
        self.rotation.subscribe()
    }

    pub fn current(&self) -> Option<PreviewCard> {
        let state = self.state();
        if !state.is_visible {
            return None;
        }
        let ad = self.popups.get(state.current_index)?;
        Some(PreviewCard {
            campaign: ad.clone(),
            anchor_class: ad.position.anchor_class(),
            slide_class: ad.position.popup_slide_class(),
            show_close: ad.is_dismissible,
            media: MediaSource::for_campaign(ad, &self.media_origin),
            heading: ad
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Advertisement".to_string()),
            body: ad
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .or_else(|| ad.business_name.clone().filter(|b| !b.trim().is_empty()))
                .unwrap_or_else(|| "Sponsored".to_string()),
        })
    }

    /// 关闭当前预览弹窗；不可关闭的弹窗忽略
    pub fn dismiss(&self) -> bool {
        match self.current() {
            Some(card) if card.show_close => {
                self.rotation.dismiss();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rotation::{CYCLE_COMPLETE_MESSAGE, PREVIEW_EMPTY_MESSAGE};
    use std::time::Duration;
    use tokio::time::sleep;

    fn popup(id: u64, active: bool) -> Campaign {
        let mut ad = Campaign::new(id, Placement::Popup);
        ad.is_active = active;
        ad.is_dismissible = true;
        ad
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn only_active_popups_are_previewed() {
        let campaigns = vec![
            popup(1, true),
            popup(2, false),
            Campaign::new(3, Placement::PinnedFade),
            popup(4, true),
        ];
        let preview = PreviewSimulator::mount(&campaigns, "http://localhost:5071");
        settle().await;

        let ids: Vec<_> = preview.popups().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 4]);
        let card = preview.current().unwrap();
        assert_eq!(card.campaign.id, CampaignId(1));
        assert_eq!(card.heading, "Advertisement");
        assert_eq!(card.body, "Sponsored");
        assert_eq!(preview.state().status_message, "Showing popup 1 of 2");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_advance_through_a_cycle() {
        let campaigns = vec![popup(1, true), popup(2, true), popup(3, true)];
        let preview = PreviewSimulator::mount(&campaigns, "");
        settle().await;

        sleep(Duration::from_millis(30_300)).await;
        let state = preview.state();
        assert_eq!(state.current_index, 1);
        assert_eq!(state.status_message, "");

        sleep(Duration::from_millis(2 * 30_300)).await;
        let state = preview.state();
        assert_eq!(state.current_index, 0);
        assert_eq!(state.status_message, CYCLE_COMPLETE_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_first_of_three_waits_one_minute() {
        let campaigns = vec![popup(1, true), popup(2, true), popup(3, true)];
        let preview = PreviewSimulator::mount(&campaigns, "");
        settle().await;

        assert!(preview.dismiss());
        settle().await;
        let state = preview.state();
        assert!(!state.is_visible);
        assert!(state.status_message.contains("(2 of 3)"));
        assert!(preview.current().is_none());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(preview.current().map(|c| c.campaign.id), Some(CampaignId(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_last_of_three_waits_five_minutes() {
        let campaigns = vec![popup(1, true), popup(2, true), popup(3, true)];
        let preview = PreviewSimulator::mount(&campaigns, "");
        settle().await;
        sleep(Duration::from_millis(2 * 30_300)).await;
        assert_eq!(preview.state().current_index, 2);

        assert!(preview.dismiss());
        settle().await;
        assert!(preview.state().status_message.contains("Waiting 5 minutes"));

        sleep(Duration::from_secs(299)).await;
        assert!(preview.current().is_none());
        sleep(Duration::from_secs(1)).await;
        assert_eq!(preview.current().map(|c| c.campaign.id), Some(CampaignId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_with_new_list_restarts_and_empty_hides() {
        let mut preview = PreviewSimulator::mount(&[popup(1, true), popup(2, true)], "");
        settle().await;
        sleep(Duration::from_millis(30_300)).await;
        assert_eq!(preview.state().current_index, 1);

        assert!(!preview.update_campaigns(&[popup(1, true), popup(2, true)]));
        assert!(preview.update_campaigns(&[popup(1, true), popup(2, true), popup(5, true)]));
        settle().await;
        assert_eq!(preview.state().current_index, 0);
        assert_eq!(preview.state().status_message, "Showing popup 1 of 3");

        assert!(preview.update_campaigns(&[popup(1, false)]));
        settle().await;
        assert!(!preview.state().is_visible);
        assert_eq!(preview.state().status_message, PREVIEW_EMPTY_MESSAGE);
        assert!(!preview.dismiss());
    }
}
