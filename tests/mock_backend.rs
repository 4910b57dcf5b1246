use std::sync::Arc;
use std::time::Duration;

use ad_rotator::admin::{AdminConsole, Banner, CampaignForm, MediaUpload};
use ad_rotator::client::{AdBackend, AdClient, AdFilter};
use ad_rotator::engine::{LiveRenderer, LoggingOpener, RenderFrame, RendererServices, SessionDismissalLedger};
use ad_rotator::error::AdError;
use ad_rotator::mock_backend::{self, Counters, MockStore};
use ad_rotator::model::adapters::MemorySessionStore;
use ad_rotator::model::{Campaign, CampaignId, Placement, Platform, Position, RendererConfig};
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

async fn start(campaigns: Vec<Campaign>) -> (AdClient, Arc<MockStore>) {
    let store = Arc::new(MockStore::new(campaigns));
    let (addr, _server) = mock_backend::bind("127.0.0.1:0", Arc::clone(&store)).await.unwrap();
    let client = AdClient::new(&format!("http://{}", addr), Duration::from_secs(5));
    (client, store)
}

fn ad(id: u64, placement: Placement) -> Campaign {
    let mut campaign = Campaign::new(id, placement);
    campaign.title = Some(format!("Ad {}", id));
    campaign
}

#[tokio::test]
async fn console_create_toggle_delete_cycle() {
    let (client, _store) = start(Vec::new()).await;
    let mut console = AdminConsole::new(client.clone());
    assert!(console.refresh().await);
    assert!(console.campaigns().is_empty());

    let form = CampaignForm {
        title: "Night shift openings".into(),
        placement: Placement::PinnedFade,
        position: Position::TopLeft,
        fade_duration_seconds: 5.0,
        ..CampaignForm::default()
    };
    let created = console.save(&form).await.unwrap();
    assert_eq!(created.id, CampaignId(1));
    assert_eq!(console.banner(), Some(&Banner::Success("Advertisement created successfully.".into())));
    assert_eq!(console.pinned_fade_ads().len(), 1);
    assert!(console.popup_ads().is_empty());

    let toggled = console.toggle_active(created.id).await.unwrap();
    assert!(!toggled.is_active);
    assert!(client.list(&AdFilter::live(Platform::Web)).await.unwrap().is_empty());
    assert!(!console.campaigns()[0].is_active);

    assert!(console.delete(created.id).await);
    assert!(console.campaigns().is_empty());

    // 已删除的 id：横幅显示服务端返回的 message
    assert!(!console.delete(created.id).await);
    assert_eq!(console.banner(), Some(&Banner::Error("Advertisement 1 not found.".into())));
}

#[tokio::test]
async fn edit_keeps_media_and_reports_validation_errors() {
    let (client, _store) = start(Vec::new()).await;
    let mut console = AdminConsole::new(client.clone());

    let form = CampaignForm {
        title: "Cafe".into(),
        file: Some(MediaUpload {
            file_name: "cafe.png".into(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }),
        ..CampaignForm::default()
    };
    let created = console.save(&form).await.unwrap();
    assert_eq!(created.file_url.as_deref(), Some("/uploads/cafe.png"));
    assert_eq!(client.media_url("/uploads/cafe.png"), format!("{}/uploads/cafe.png", client.origin()));

    let mut edit = console.begin_edit(created.id).unwrap();
    assert_eq!(console.editing(), Some(created.id));
    edit.title = "x".repeat(121);
    assert!(console.save(&edit).await.is_none());
    assert_eq!(
        console.banner(),
        Some(&Banner::Error("Title must be 120 characters or fewer.".into()))
    );
    assert_eq!(console.editing(), Some(created.id));

    edit.title = "Corner Cafe".into();
    let updated = console.save(&edit).await.unwrap();
    assert_eq!(updated.title.as_deref(), Some("Corner Cafe"));
    assert_eq!(updated.file_url.as_deref(), Some("/uploads/cafe.png"));
    assert_eq!(console.banner(), Some(&Banner::Success("Advertisement updated successfully.".into())));
    assert_eq!(console.editing(), None);
}

#[tokio::test]
async fn live_filter_applies_activity_window_and_platform() {
    let mut mobile_only = ad(2, Placement::Popup);
    mobile_only.platform = Platform::Mobile;
    let mut expired = ad(3, Placement::Popup);
    expired.end_date = Some(Utc::now() - ChronoDuration::hours(1));
    let mut inactive = ad(4, Placement::PinnedFade);
    inactive.is_active = false;
    let (client, _store) = start(vec![ad(1, Placement::Popup), mobile_only, expired, inactive]).await;

    let live: Vec<_> = client
        .list(&AdFilter::live(Platform::Web))
        .await
        .unwrap()
        .iter()
        .map(|c| c.id.0)
        .collect();
    assert_eq!(live, vec![1]);

    let everything = client.list(&AdFilter::admin()).await.unwrap();
    assert_eq!(everything.len(), 4);
}

#[tokio::test]
async fn tracking_endpoints_count_and_reject_unknown_ids() {
    let (client, store) = start(vec![ad(7, Placement::Popup)]).await;

    client.track_view(CampaignId(7)).await.unwrap();
    client.track_click(CampaignId(7)).await.unwrap();
    client.track_click(CampaignId(7)).await.unwrap();
    assert_eq!(store.counters(CampaignId(7)), Counters { views: 1, clicks: 2 });

    let err = client.track_view(CampaignId(99)).await.unwrap_err();
    match err {
        AdError::Status { status, message } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(message.as_deref(), Some("Advertisement 99 not found."));
        }
        other => panic!("unexpected error: {other}"),
    }
}

async fn wait_for(frames: &mut watch::Receiver<RenderFrame>, done: impl Fn(&RenderFrame) -> bool) -> RenderFrame {
    timeout(Duration::from_secs(5), async {
        loop {
            if done(&frames.borrow_and_update()) {
                return frames.borrow().clone();
            }
            frames.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn renderer_against_backend_dismisses_and_tracks() {
    let mut first = ad(1, Placement::Popup);
    first.is_dismissible = true;
    let mut pinned = ad(3, Placement::PinnedFade);
    pinned.position = Position::TopRight;
    let (client, store) = start(vec![first, ad(2, Placement::Popup), pinned]).await;

    let services = RendererServices {
        backend: Arc::new(client.clone()),
        ledger: Arc::new(SessionDismissalLedger::load(MemorySessionStore::new())),
        opener: Arc::new(LoggingOpener),
        media_origin: client.origin().to_string(),
        platform: Platform::Web,
        poll_interval: Duration::from_secs(30),
    };
    let renderer = LiveRenderer::mount(RendererConfig::default(), services);
    let mut frames = renderer.subscribe();

    let frame = wait_for(&mut frames, |f| f.popup.is_some() && f.pinned.is_some()).await;
    let popup = frame.popup.unwrap();
    assert_eq!(popup.campaign.id, CampaignId(1));
    assert!(popup.show_close);
    assert_eq!(frame.pinned.unwrap().campaign.id, CampaignId(3));

    assert!(renderer.dismiss_popup(CampaignId(1)));
    let frame = wait_for(&mut frames, |f| f.popup.as_ref().map(|p| p.campaign.id) == Some(CampaignId(2))).await;
    assert!(!frame.popup.unwrap().show_close);
    assert!(!renderer.dismiss_popup(CampaignId(2)));

    // 曝光在后台上报
    for _ in 0..50 {
        if [1, 2, 3].iter().all(|id| store.counters(CampaignId(*id)).views == 1) {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.counters(CampaignId(1)).views, 1);
    assert_eq!(store.counters(CampaignId(2)).views, 1);
    assert_eq!(store.counters(CampaignId(3)).views, 1);
}
