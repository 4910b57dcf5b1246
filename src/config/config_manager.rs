use std::path::PathBuf;
use std::time::Duration;

use crate::engine::store::DEFAULT_POLL_INTERVAL;
use crate::model::placements::Platform;

/// 未配置时使用的后台地址
pub const DEFAULT_API_ORIGIN: &str = "http://localhost:5071";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 运行配置：后台地址、轮询间隔、请求超时、平台、日志和会话目录
#[derive(Clone, Debug)]
pub struct ConfigManager {
    pub api_origin: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub platform: Platform,
    pub log_dir: PathBuf,
    pub session_dir: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self {
            api_origin: DEFAULT_API_ORIGIN.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            platform: Platform::Web,
            log_dir: PathBuf::from("logs"),
            session_dir: PathBuf::from("session"),
        }
    }
}

/// 去掉首尾空白和末尾的 `/`；为空时回落到默认地址
pub fn normalize_origin(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_ORIGIN.to_string()
    } else {
        trimmed.to_string()
    }
}

impl ConfigManager {
    pub fn from_args(
        api_url: Option<&str>,
        poll_interval_secs: u64,
        request_timeout_ms: u64,
        platform: Platform,
        log_dir: impl Into<PathBuf>,
        session_dir: impl Into<PathBuf>,
    ) -> Self {
        ConfigManager {
            api_origin: normalize_origin(api_url),
            // 0 会让 interval 直接 panic
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            request_timeout: Duration::from_millis(request_timeout_ms.max(1)),
            platform,
            log_dir: log_dir.into(),
            session_dir: session_dir.into(),
        }
    }

    /// `{origin}/api`
    pub fn api_base(&self) -> String {
        format!("{}/api", self.api_origin)
    }
}
