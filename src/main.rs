// src/main.rs

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use ad_rotator::admin::{AdminConsole, Banner, CampaignForm, MediaUpload};
use ad_rotator::client::{AdClient, AdFilter};
use ad_rotator::config::ConfigManager;
use ad_rotator::engine::{
    AdSlot, Interaction, LiveRenderer, LoggingOpener, PreviewSimulator, RendererServices,
    SessionDismissalLedger, TIMER_INFO,
};
use ad_rotator::error::{AdError, Result};
use ad_rotator::logging::{FrameLog, RuntimeLogger};
use ad_rotator::mock_backend;
use ad_rotator::model::adapters::FileSessionStore;
use ad_rotator::model::{CampaignId, PinnedMode, Placement, Platform, Position, RendererConfig};

#[derive(Parser, Debug)]
#[command(author = "whiteCcinn", version = "1.0", about = "Advertisement rotation engine for a job marketplace")]
struct CliArgs {
    /// 后台地址（不含 /api）
    #[arg(long, env = "AD_API_URL", global = true)]
    api_url: Option<String>,
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,
    #[arg(long, default_value = "session", global = true)]
    session_dir: PathBuf,
    #[arg(long, default_value = "Web", global = true)]
    platform: Platform,
    #[arg(long, default_value_t = 15, global = true)]
    poll_interval_secs: u64,
    #[arg(long, default_value_t = 10_000, global = true)]
    request_timeout_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 实时渲染：stdin 支持 `dismiss`、`click popup|pinned`、`key popup|pinned <key>`
    Render {
        #[arg(long)]
        hide_popup: bool,
        #[arg(long)]
        hide_pinned: bool,
        /// 内嵌模式（不传槽位时取全部 PinnedFade 广告，不限位置）
        #[arg(long)]
        inline: bool,
        #[arg(long)]
        inline_slot: Option<Position>,
    },
    /// 后台弹窗预览
    Preview,
    /// 后台广告管理
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// 本地 mock 后台
    MockBackend {
        #[arg(short, long, default_value_t = 5071)]
        port: u16,
    },
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    List,
    Toggle { id: u64 },
    Delete { id: u64 },
    Create(FormArgs),
    Update {
        id: u64,
        #[command(flatten)]
        form: FormArgs,
    },
}

#[derive(Args, Debug, Default)]
struct FormArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    platform_target: Option<Platform>,
    #[arg(long)]
    placement: Option<Placement>,
    #[arg(long)]
    position: Option<Position>,
    #[arg(long)]
    fade_duration_seconds: Option<f64>,
    #[arg(long)]
    dismissible: Option<bool>,
    #[arg(long)]
    target_url: Option<String>,
    #[arg(long)]
    business_name: Option<String>,
    #[arg(long)]
    display_order: Option<i32>,
    #[arg(long)]
    active: Option<bool>,
    #[arg(long)]
    start_date: Option<DateTime<Utc>>,
    #[arg(long)]
    end_date: Option<DateTime<Utc>>,
    /// 媒体文件路径
    #[arg(long)]
    file: Option<PathBuf>,
}

impl FormArgs {
    async fn apply(self, form: &mut CampaignForm) -> Result<()> {
        if let Some(v) = self.title { form.title = v; }
        if let Some(v) = self.description { form.description = v; }
        if let Some(v) = self.platform_target { form.platform = v; }
        if let Some(v) = self.placement { form.placement = v; }
        if let Some(v) = self.position { form.position = v; }
        if let Some(v) = self.fade_duration_seconds { form.fade_duration_seconds = v; }
        if let Some(v) = self.dismissible { form.is_dismissible = v; }
        if let Some(v) = self.target_url { form.target_url = v; }
        if let Some(v) = self.business_name { form.business_name = v; }
        if let Some(v) = self.display_order { form.display_order = v; }
        if let Some(v) = self.active { form.is_active = v; }
        if self.start_date.is_some() { form.start_date = self.start_date; }
        if self.end_date.is_some() { form.end_date = self.end_date; }
        if let Some(path) = self.file {
            let bytes = tokio::fs::read(&path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| AdError::Config(format!("not a file: {}", path.display())))?;
            form.file = Some(MediaUpload { file_name, bytes });
        }
        Ok(())
    }
}

/// 初始化全局 tracing：按小时滚动的 JSON 文件 + stderr
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    let log_file = rolling::hourly(log_dir, "ad_rotator.json");
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().json().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AdError::Config(format!("Unable to set global tracing subscriber: {}", e)))?;
    Ok(guard)
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    if let Err(e) = run(args).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let config = ConfigManager::from_args(
        args.api_url.as_deref(),
        args.poll_interval_secs,
        args.request_timeout_ms,
        args.platform,
        args.log_dir,
        args.session_dir,
    );
    let _guard = init_tracing(&config.log_dir)?;

    // 运行日志（服务状态、渲染帧）
    let runtime_logger = RuntimeLogger::new(&config.log_dir, "runtime", 1000, 100, 1000);
    info!(api = %config.api_base(), "ad rotator starting");

    let result = match args.command {
        Command::Render { hide_popup, hide_pinned, inline, inline_slot } => {
            let renderer_config = RendererConfig {
                show_popup: !hide_popup,
                show_pinned: !hide_pinned,
                pinned_mode: if inline || inline_slot.is_some() { PinnedMode::Inline } else { PinnedMode::Fixed },
                inline_slot,
            };
            render(&config, renderer_config, &runtime_logger).await
        }
        Command::Preview => preview(&config, &runtime_logger).await,
        Command::Admin { action } => admin(&config, action).await,
        Command::MockBackend { port } => {
            let (addr, server) = mock_backend::start_mock_backend_server(port).await?;
            runtime_logger.log("INFO", &format!("Mock backend running at http://{}", addr)).await;
            let _ = signal::ctrl_c().await;
            server.abort();
            Ok(())
        }
    };

    if let Err(e) = &result {
        runtime_logger.log("ERROR", &e.to_string()).await;
    }
    runtime_logger.log("INFO", "ad rotator shut down").await;
    runtime_logger.shutdown().await;
    result
}

async fn render(config: &ConfigManager, renderer_config: RendererConfig, logger: &Arc<RuntimeLogger>) -> Result<()> {
    let session = Arc::new(FileSessionStore::start(&config.session_dir)?);
    let services = RendererServices {
        backend: Arc::new(AdClient::new(&config.api_origin, config.request_timeout)),
        ledger: Arc::new(SessionDismissalLedger::load(Arc::clone(&session))),
        opener: Arc::new(LoggingOpener),
        media_origin: config.api_origin.clone(),
        platform: config.platform,
        poll_interval: config.poll_interval,
    };
    let slot = renderer_config.slot_label();
    let renderer = LiveRenderer::mount(renderer_config, services);
    logger.log("INFO", &format!("renderer mounted ({})", slot)).await;

    let mut frames = renderer.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                logger.frame(&FrameLog::live(&slot, &frame)).await;
                println!("{}", serde_json::to_string(&frame)?);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                handle_render_input(&renderer, line.trim()).await;
            }
        }
    }

    drop(renderer);
    session.end_session()?;
    logger.log("INFO", "renderer unmounted, session ended").await;
    Ok(())
}

async fn handle_render_input(renderer: &LiveRenderer, line: &str) {
    let mut parts = line.splitn(3, ' ');
    let slot = |name: Option<&str>| match name {
        Some("popup") => Some(AdSlot::Popup),
        Some("pinned") => Some(AdSlot::Pinned),
        _ => None,
    };
    match parts.next() {
        Some("dismiss") => {
            if let Some(popup) = renderer.frame().popup {
                renderer.dismiss_popup(popup.campaign.id);
            }
        }
        Some("click") => {
            if let Some(slot) = slot(parts.next()) {
                renderer.interact(slot, Interaction::Click).await;
            }
        }
        Some("key") => {
            if let (Some(slot), Some(key)) = (slot(parts.next()), parts.next()) {
                let key = if key == "space" { " " } else { key };
                renderer.interact(slot, Interaction::Key(key.to_string())).await;
            }
        }
        Some("") | None => {}
        Some(other) => error!(command = other, "unknown render command"),
    }
}

async fn preview(config: &ConfigManager, logger: &Arc<RuntimeLogger>) -> Result<()> {
    let client = AdClient::new(&config.api_origin, config.request_timeout);
    let campaigns = client.list(&AdFilter::admin()).await?;
    let mut simulator = PreviewSimulator::mount(&campaigns, client.origin());
    println!("{}", TIMER_INFO);

    let mut states = simulator.subscribe();
    let mut refresh = tokio::time::interval(config.poll_interval);
    refresh.tick().await;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                let card = simulator.current();
                logger.frame(&FrameLog::preview(&state, card.as_ref())).await;
                match &card {
                    Some(card) => println!("[{}] {} | {} ({})", card.campaign.id, card.heading, card.body, state.status_message),
                    None => println!("{}", state.status_message),
                }
            }
            _ = refresh.tick() => match client.list(&AdFilter::admin()).await {
                Ok(campaigns) => {
                    simulator.update_campaigns(&campaigns);
                }
                Err(e) => error!(error = %e, "Failed to load advertisements."),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "dismiss" && !simulator.dismiss() {
                    println!("current popup cannot be dismissed");
                }
            }
        }
    }
    Ok(())
}

async fn admin(config: &ConfigManager, action: AdminAction) -> Result<()> {
    let mut console = AdminConsole::new(AdClient::new(&config.api_origin, config.request_timeout));
    console.refresh().await;
    match action {
        AdminAction::List => {}
        AdminAction::Toggle { id } => {
            console.toggle_active(CampaignId(id)).await;
        }
        AdminAction::Delete { id } => {
            console.delete(CampaignId(id)).await;
        }
        AdminAction::Create(fields) => {
            let mut form = CampaignForm::default();
            fields.apply(&mut form).await?;
            console.save(&form).await;
        }
        AdminAction::Update { id, form: fields } => {
            match console.begin_edit(CampaignId(id)) {
                Some(mut form) => {
                    fields.apply(&mut form).await?;
                    console.save(&form).await;
                }
                None => return Err(AdError::Config(format!("advertisement {} not found", id))),
            }
        }
    }

    for (label, ads) in [("Popup", console.popup_ads()), ("PinnedFade", console.pinned_fade_ads())] {
        println!("{} ({})", label, ads.len());
        for ad in ads {
            println!(
                "  #{} {} [{}] {} {}",
                ad.id,
                ad.title.as_deref().unwrap_or("(untitled)"),
                ad.position,
                ad.platform,
                if ad.is_active { "active" } else { "inactive" }
            );
        }
    }
    match console.banner() {
        Some(Banner::Success(message)) => println!("{}", message),
        Some(Banner::Error(message)) => eprintln!("{}", message),
        None => {}
    }
    Ok(())
}
