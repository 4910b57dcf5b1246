// src/model/campaign.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

use crate::model::placements::{Placement, Platform, Position};

/// 未设置或为 0 时的默认展示时长（秒）
pub const DEFAULT_FADE_SECONDS: f64 = 8.0;
/// 展示时长下限（秒）
pub const MIN_FADE_SECONDS: f64 = 2.0;

const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".webm", ".mov", ".avi"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CampaignId(pub u64);

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 广告记录（客户端只读）
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub placement: Placement,
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: Position,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_dismissible: bool,
    #[serde(default)]
    pub fade_duration_seconds: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// 缺失、null 或无法识别的位置一律回落为 BottomRight
fn lenient_position<'de, D>(deserializer: D) -> Result<Position, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
}

impl Campaign {
    pub fn new(id: u64, placement: Placement) -> Self {
        Self {
            id: CampaignId(id),
            placement,
            position: Position::default(),
            platform: Platform::Both,
            is_active: true,
            is_dismissible: false,
            fade_duration_seconds: None,
            title: None,
            description: None,
            business_name: None,
            target_url: None,
            file_url: None,
            display_order: 0,
            start_date: None,
            end_date: None,
        }
    }

    /// `max(2, fadeDurationSeconds || 8)` 秒
    pub fn effective_fade_duration(&self) -> Duration {
        let configured = self
            .fade_duration_seconds
            .filter(|secs| secs.is_finite() && *secs != 0.0)
            .unwrap_or(DEFAULT_FADE_SECONDS);
        // 超出 Duration 范围的配置按默认时长处理
        Duration::try_from_secs_f64(configured.max(MIN_FADE_SECONDS))
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_FADE_SECONDS))
    }

    /// 是否处于投放时间窗口内（服务端已过滤，mock 后端复用）
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date.map_or(true, |start| start <= now) && self.end_date.map_or(true, |end| end >= now)
    }

    pub fn target_url(&self) -> Option<&str> {
        self.target_url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    fn non_blank(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// 标题 + 正文；仅当 description 或 businessName 存在时展示
    pub fn meta(&self) -> Option<AdMeta> {
        let body = Self::non_blank(&self.description).or_else(|| Self::non_blank(&self.business_name))?;
        Some(AdMeta {
            heading: Self::non_blank(&self.title).unwrap_or_default().to_string(),
            body: body.to_string(),
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AdMeta {
    pub heading: String,
    pub body: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum MediaSource {
    Image(String),
    Video(String),
    Placeholder,
}

impl MediaSource {
    pub const PLACEHOLDER_TEXT: &'static str = "No media uploaded";

    pub fn for_campaign(campaign: &Campaign, origin: &str) -> Self {
        match campaign.file_url.as_deref().filter(|url| !url.is_empty()) {
            None => MediaSource::Placeholder,
            Some(file_url) if is_video_file(file_url) => MediaSource::Video(media_url(origin, file_url)),
            Some(file_url) => MediaSource::Image(media_url(origin, file_url)),
        }
    }
}

pub fn is_video_file(file_url: &str) -> bool {
    let lower = file_url.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// 相对路径拼接到 API origin；http/https 绝对地址原样返回
pub fn media_url(origin: &str, file_url: &str) -> String {
    if file_url.is_empty() {
        return String::new();
    }
    if file_url.starts_with("http://") || file_url.starts_with("https://") {
        return file_url.to_string();
    }
    let separator = if file_url.starts_with('/') { "" } else { "/" };
    format!("{}{}{}", origin.trim_end_matches('/'), separator, file_url)
}
