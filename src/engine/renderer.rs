// src/engine/renderer.rs

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::ad_client::{AdBackend, AdFilter};
use crate::engine::dismissal::DismissalLedger;
use crate::engine::rotation::{RotationPolicy, RotationState};
use crate::engine::scheduler::RotationHandle;
use crate::engine::selector::{active_pinned, pinned_candidates, popup_candidate};
use crate::engine::store::{CampaignStore, Snapshot};
use crate::engine::tracker::{AdTracker, Interaction, LinkOpener, NavigationRequest};
use crate::model::campaign::{AdMeta, Campaign, CampaignId, MediaSource};
use crate::model::context::{PinnedMode, RendererConfig};
use crate::model::placements::Platform;

/// 实时渲染器依赖的外部协作者
#[derive(Clone)]
pub struct RendererServices {
    pub backend: Arc<dyn AdBackend>,
    pub ledger: Arc<dyn DismissalLedger>,
    pub opener: Arc<dyn LinkOpener>,
    pub media_origin: String,
    pub platform: Platform,
    pub poll_interval: Duration,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PopupView {
    pub campaign: Campaign,
    pub anchor_class: &'static str,
    pub slide_class: &'static str,
    /// 仅可关闭的弹窗显示关闭按钮
    pub show_close: bool,
    pub media: MediaSource,
    pub meta: Option<AdMeta>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "layout", rename_all = "camelCase")]
pub enum PinnedLayout {
    Anchored { anchor_class: &'static str },
    Inline,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PinnedView {
    pub campaign: Campaign,
    pub layout: PinnedLayout,
    /// false 表示正在淡出
    pub is_visible: bool,
    pub media: MediaSource,
    /// 固定锚点只显示标题，内嵌槽位显示标题和正文
    pub meta: Option<AdMeta>,
    pub compact: bool,
}

/// 某一时刻页面上应该绘制的广告
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    pub popup: Option<PopupView>,
    pub pinned: Option<PinnedView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdSlot {
    Popup,
    Pinned,
}

enum RendererCommand {
    Reselect,
}

/// 实时渲染器：组合广告列表轮询、选择、轮播和上报。丢弃即卸载。
pub struct LiveRenderer {
    config: RendererConfig,
    ledger: Arc<dyn DismissalLedger>,
    tracker: Arc<AdTracker>,
    frames: watch::Receiver<RenderFrame>,
    commands: mpsc::UnboundedSender<RendererCommand>,
    task: JoinHandle<()>,
}

struct RenderContext {
    config: RendererConfig,
    policy: RotationPolicy,
    ledger: Arc<dyn DismissalLedger>,
    tracker: Arc<AdTracker>,
    media_origin: String,
}

impl LiveRenderer {
    pub fn mount(config: RendererConfig, services: RendererServices) -> Self {
        let tracker = Arc::new(AdTracker::new(
            Arc::clone(&services.backend),
            Arc::clone(&services.opener),
        ));
        let store = CampaignStore::spawn(
            Arc::clone(&services.backend),
            AdFilter::live(services.platform),
            services.poll_interval,
        );
        let policy = RotationPolicy::live_pinned();
        let rotation = RotationHandle::spawn(policy.clone(), config.slot_label());
        let (frame_tx, frames) = watch::channel(RenderFrame::default());
        let (commands, receiver) = mpsc::unbounded_channel();

        info!(slot = %config.slot_label(), show_popup = config.show_popup, show_pinned = config.show_pinned, "ad renderer mounted");
        let context = RenderContext {
            config: config.clone(),
            policy,
            ledger: Arc::clone(&services.ledger),
            tracker: Arc::clone(&tracker),
            media_origin: services.media_origin,
        };
        let task = tokio::spawn(render_loop(context, store, rotation, receiver, frame_tx));

        Self {
            config,
            ledger: services.ledger,
            tracker,
            frames,
            commands,
            task,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn frame(&self) -> RenderFrame {
        self.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderFrame> {
        self.frames.clone()
    }

    /// 关闭当前弹窗；只有正在展示且可关闭的弹窗才生效
    pub fn dismiss_popup(&self, id: CampaignId) -> bool {
        let dismissible = self
            .frames
            .borrow()
            .popup
            .as_ref()
            .is_some_and(|popup| popup.campaign.id == id && popup.show_close);
        if !dismissible {
            debug!(campaign_id = %id, "ignoring dismissal of a popup that is not showing or not dismissible");
            return false;
        }
        self.ledger.dismiss(id);
        let _ = self.commands.send(RendererCommand::Reselect);
        true
    }

    /// 广告内容区的点击/按键
    pub async fn interact(&self, slot: AdSlot, interaction: Interaction) -> Option<NavigationRequest> {
        let campaign = {
            let frame = self.frames.borrow();
            match slot {
                AdSlot::Popup => frame.popup.as_ref().map(|p| p.campaign.clone()),
                AdSlot::Pinned => frame.pinned.as_ref().map(|p| p.campaign.clone()),
            }
        }?;
        self.tracker.interact(&campaign, &interaction).await
    }
}

impl Drop for LiveRenderer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn render_loop(
    context: RenderContext,
    store: CampaignStore,
    rotation: RotationHandle,
    mut commands: mpsc::UnboundedReceiver<RendererCommand>,
    frame_tx: watch::Sender<RenderFrame>,
) {
    let mut snapshots = store.subscribe();
    let mut rotation_rx = rotation.subscribe();
    let mut candidate_key: Vec<(CampaignId, Duration)> = Vec::new();
    let mut candidates_epoch = 0u64;

    loop {
        let snapshot: Snapshot = snapshots.borrow_and_update().clone();
        let candidates = if context.config.show_pinned {
            pinned_candidates(&snapshot, context.config.pinned_mode, context.config.inline_slot)
        } else {
            Vec::new()
        };

        let published = rotation_rx.borrow_and_update().clone();
        let key: Vec<(CampaignId, Duration)> = candidates
            .iter()
            .map(|c| (c.id, context.policy.display_for(c)))
            .collect();
        if key != candidate_key {
            debug!(slot = %context.config.slot_label(), candidates = key.len(), "pinned candidates changed");
            rotation.set_candidates(key.iter().map(|(_, display)| *display).collect());
            candidate_key = key;
            candidates_epoch += 1;
        }
        let rotation_state = rotation_for_epoch(published, candidates_epoch);

        let frame = compose_frame(&context, &snapshot, &candidates, &rotation_state);
        if let Some(popup) = &frame.popup {
            context.tracker.track_view(popup.campaign.id);
        }
        if let Some(pinned) = &frame.pinned {
            context.tracker.track_view(pinned.campaign.id);
        }
        frame_tx.send_if_modified(|published| {
            if *published != frame {
                *published = frame;
                true
            } else {
                false
            }
        });

        tokio::select! {
            changed = snapshots.changed() => if changed.is_err() { break },
            changed = rotation_rx.changed() => if changed.is_err() { break },
            command = commands.recv() => match command {
                Some(RendererCommand::Reselect) => {}
                None => break,
            },
        }
    }
    debug!(slot = %context.config.slot_label(), "ad renderer stopped");
}

/// 轮播任务尚未处理最新候选列表时，发布的下标属于旧列表；按重置后的状态绘制
fn rotation_for_epoch(published: RotationState, epoch: u64) -> RotationState {
    if published.candidates_epoch == epoch {
        return published;
    }
    RotationState {
        current_index: 0,
        is_visible: true,
        status_message: String::new(),
        candidates_epoch: epoch,
    }
}

fn compose_frame(
    context: &RenderContext,
    snapshot: &[Campaign],
    candidates: &[&Campaign],
    rotation: &RotationState,
) -> RenderFrame {
    let config = &context.config;
    let origin = context.media_origin.as_str();

    let popup = if config.show_popup {
        popup_candidate(snapshot, |id| context.ledger.is_dismissed(id)).map(|ad| PopupView {
            campaign: ad.clone(),
            anchor_class: ad.position.anchor_class(),
            slide_class: ad.position.popup_slide_class(),
            show_close: ad.is_dismissible,
            media: MediaSource::for_campaign(ad, origin),
            meta: ad.meta(),
        })
    } else {
        None
    };

    let pinned = active_pinned(candidates, rotation.current_index).map(|ad| {
        let (layout, compact) = match config.pinned_mode {
            PinnedMode::Fixed => (
                PinnedLayout::Anchored {
                    anchor_class: ad.position.anchor_class(),
                },
                true,
            ),
            PinnedMode::Inline => (PinnedLayout::Inline, false),
        };
        PinnedView {
            campaign: ad.clone(),
            layout,
            is_visible: rotation.is_visible,
            media: MediaSource::for_campaign(ad, origin),
            meta: ad.meta(),
            compact,
        }
    });

    RenderFrame { popup, pinned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dismissal::{SessionDismissalLedger, POPUP_DISMISSED_KEY};
    use crate::engine::store::DEFAULT_POLL_INTERVAL;
    use crate::engine::tracker::tests::{RecordingBackend, RecordingOpener};
    use crate::model::adapters::{MemorySessionStore, SessionStore};
    use crate::model::placements::{Placement, Position};
    use tokio::time::sleep;

    fn services(backend: Arc<RecordingBackend>, store: MemorySessionStore) -> (RendererServices, Arc<RecordingOpener>) {
        let opener = Arc::new(RecordingOpener::default());
        let services = RendererServices {
            backend,
            ledger: Arc::new(SessionDismissalLedger::load(store)),
            opener: opener.clone(),
            media_origin: "http://localhost:5071".into(),
            platform: Platform::Web,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        (services, opener)
    }

    fn pinned(id: u64, position: Position, fade: f64) -> Campaign {
        let mut ad = Campaign::new(id, Placement::PinnedFade);
        ad.position = position;
        ad.fade_duration_seconds = Some(fade);
        ad
    }

    async fn settle() {
        sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_popups_are_skipped_then_exhausted() {
        let mut first = Campaign::new(1, Placement::Popup);
        first.is_dismissible = true;
        let mut second = Campaign::new(2, Placement::Popup);
        second.is_dismissible = true;
        let backend = RecordingBackend::with(vec![first, second]);

        let session = MemorySessionStore::new();
        session.set_item(POPUP_DISMISSED_KEY, "[1]".into()).unwrap();
        let (services, _) = services(backend, session);
        let ledger = Arc::clone(&services.ledger);
        let renderer = LiveRenderer::mount(RendererConfig::default(), services);
        settle().await;

        let popup = renderer.frame().popup.unwrap();
        assert_eq!(popup.campaign.id, CampaignId(2));
        assert!(popup.show_close);

        assert!(renderer.dismiss_popup(CampaignId(2)));
        settle().await;
        assert_eq!(ledger.dismissed(), vec![CampaignId(1), CampaignId(2)]);
        assert!(renderer.frame().popup.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn non_dismissible_popup_stays() {
        let backend = RecordingBackend::with(vec![Campaign::new(3, Placement::Popup)]);
        let (services, _) = services(backend, MemorySessionStore::new());
        let renderer = LiveRenderer::mount(RendererConfig::default(), services);
        settle().await;

        assert!(!renderer.dismiss_popup(CampaignId(3)));
        settle().await;
        assert_eq!(renderer.frame().popup.map(|p| p.campaign.id), Some(CampaignId(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn view_reported_once_per_mount() {
        let backend = RecordingBackend::with(vec![Campaign::new(1, Placement::Popup)]);
        let (services, _) = services(backend.clone(), MemorySessionStore::new());

        let renderer = LiveRenderer::mount(RendererConfig::default(), services.clone());
        sleep(Duration::from_secs(46)).await;
        assert!(backend.list_calls() >= 4);
        assert_eq!(backend.views_of(1), 1);
        drop(renderer);

        let renderer = LiveRenderer::mount(RendererConfig::default(), services);
        sleep(Duration::from_secs(31)).await;
        assert_eq!(backend.views_of(1), 2);
        drop(renderer);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_pinned_ads_rotate_with_fade() {
        let backend = RecordingBackend::with(vec![
            pinned(10, Position::TopLeft, 2.0),
            pinned(11, Position::JobsBelowSearch, 2.0),
            pinned(12, Position::Center, 2.0),
        ]);
        let (services, _) = services(backend.clone(), MemorySessionStore::new());
        let renderer = LiveRenderer::mount(RendererConfig::default(), services);
        settle().await;

        let view = renderer.frame().pinned.unwrap();
        assert_eq!(view.campaign.id, CampaignId(10));
        assert_eq!(view.layout, PinnedLayout::Anchored { anchor_class: "pos-top-left" });
        assert!(view.is_visible && view.compact);

        sleep(Duration::from_millis(2_100)).await;
        assert!(!renderer.frame().pinned.unwrap().is_visible);

        sleep(Duration::from_millis(300)).await;
        let view = renderer.frame().pinned.unwrap();
        assert_eq!(view.campaign.id, CampaignId(12));
        assert!(view.is_visible);

        assert_eq!(backend.views_of(10), 1);
        assert_eq!(backend.views_of(12), 1);
        assert_eq!(backend.views_of(11), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn inline_slot_falls_back_to_all_pinned_ads() {
        let backend = RecordingBackend::with(vec![
            Campaign::new(1, Placement::Popup),
            pinned(20, Position::HomeBelowHeader, 8.0),
        ]);
        let (services, _) = services(backend.clone(), MemorySessionStore::new());
        let renderer = LiveRenderer::mount(RendererConfig::inline(Position::JobsEveryTwoRows), services);
        settle().await;

        let frame = renderer.frame();
        assert!(frame.popup.is_none());
        let view = frame.pinned.unwrap();
        assert_eq!(view.campaign.id, CampaignId(20));
        assert_eq!(view.layout, PinnedLayout::Inline);
        assert!(!view.compact);

        // 未展示的弹窗不上报曝光
        assert_eq!(backend.views_of(1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_renders_nothing() {
        let backend = RecordingBackend::with(vec![Campaign::new(1, Placement::Popup)]);
        backend.set_failing(true);
        let (services, _) = services(backend.clone(), MemorySessionStore::new());
        let renderer = LiveRenderer::mount(RendererConfig::default(), services);
        sleep(Duration::from_secs(16)).await;

        assert_eq!(renderer.frame(), RenderFrame::default());
        assert_eq!(backend.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pinned_click_reports_and_opens_target() {
        let mut ad = pinned(30, Position::BottomRight, 8.0);
        ad.target_url = Some("https://jobs.example/warehouse".into());
        let backend = RecordingBackend::with(vec![ad]);
        let (services, opener) = services(backend.clone(), MemorySessionStore::new());
        let renderer = LiveRenderer::mount(RendererConfig::default(), services);
        settle().await;

        let nav = renderer
            .interact(AdSlot::Pinned, Interaction::Key("Enter".into()))
            .await
            .unwrap();
        assert_eq!(nav.url, "https://jobs.example/warehouse");
        assert_eq!(backend.clicks.lock().unwrap().as_slice(), &[CampaignId(30)]);
        assert_eq!(opener.opened.lock().unwrap().len(), 1);

        assert!(renderer.interact(AdSlot::Popup, Interaction::Click).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_fade_duration_keeps_renderer_alive() {
        let mut popup = Campaign::new(1, Placement::Popup);
        popup.is_dismissible = true;
        let backend = RecordingBackend::with(vec![
            popup,
            pinned(10, Position::TopLeft, 1e30),
            pinned(11, Position::Center, 2.0),
        ]);
        let (services, _) = services(backend.clone(), MemorySessionStore::new());
        let renderer = LiveRenderer::mount(RendererConfig::default(), services);
        settle().await;

        let frame = renderer.frame();
        assert_eq!(frame.popup.map(|p| p.campaign.id), Some(CampaignId(1)));
        assert_eq!(frame.pinned.map(|p| p.campaign.id), Some(CampaignId(10)));

        // 按默认 8 秒轮播
        sleep(Duration::from_millis(8_400)).await;
        assert_eq!(renderer.frame().pinned.map(|p| p.campaign.id), Some(CampaignId(11)));
        assert!(renderer.dismiss_popup(CampaignId(1)));
        settle().await;
        assert!(renderer.frame().popup.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_pinned_list_starts_from_its_first_ad() {
        let backend = RecordingBackend::with(vec![
            pinned(10, Position::TopLeft, 2.5),
            pinned(11, Position::TopRight, 2.5),
            pinned(12, Position::Center, 2.5),
        ]);
        let (services, _) = services(backend.clone(), MemorySessionStore::new());
        let renderer = LiveRenderer::mount(RendererConfig::default(), services);

        // 每个周期 2.82 秒，第 14.9 秒时停在第 2 个
        sleep(Duration::from_millis(14_900)).await;
        assert_eq!(renderer.frame().pinned.map(|p| p.campaign.id), Some(CampaignId(12)));

        backend.set_campaigns(vec![
            pinned(13, Position::BottomLeft, 2.5),
            pinned(10, Position::TopLeft, 2.5),
            pinned(14, Position::BottomRight, 2.5),
        ]);
        sleep(Duration::from_millis(150)).await;
        let view = renderer.frame().pinned.unwrap();
        assert_eq!(view.campaign.id, CampaignId(13));
        assert!(view.is_visible);
        assert_eq!(backend.views_of(13), 1);
        assert_eq!(backend.views_of(14), 0);
    }

    #[test]
    fn rotation_state_from_previous_list_draws_reset_frame() {
        let stale = RotationState {
            current_index: 2,
            is_visible: false,
            status_message: String::new(),
            candidates_epoch: 3,
        };
        let drawn = rotation_for_epoch(stale.clone(), 4);
        assert_eq!(drawn.current_index, 0);
        assert!(drawn.is_visible);
        assert_eq!(drawn.candidates_epoch, 4);

        assert_eq!(rotation_for_epoch(stale.clone(), 3), stale);
    }
}
