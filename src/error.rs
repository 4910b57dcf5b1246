// src/error.rs

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {}", message.as_deref().unwrap_or("no message"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl AdError {
    /// 后端错误响应体中的 `message`，没有则为 None
    pub fn server_message(&self) -> Option<&str> {
        match self {
            AdError::Status { message, .. } => message.as_deref().filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }

    /// 错误横幅文案：优先用服务端 message，否则用 `fallback`
    pub fn banner_message(&self, fallback: &str) -> String {
        self.server_message()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_prefers_server_message() {
        let err = AdError::Status {
            status: StatusCode::BAD_REQUEST,
            message: Some("Title is too long.".into()),
        };
        assert_eq!(err.banner_message("Failed to create advertisement."), "Title is too long.");
    }

    #[test]
    fn banner_falls_back_without_message() {
        let blank = AdError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some("  ".into()),
        };
        assert_eq!(blank.banner_message("Failed to delete advertisement."), "Failed to delete advertisement.");

        let timeout = AdError::Timeout { ms: 10_000 };
        assert_eq!(timeout.server_message(), None);
        assert_eq!(timeout.banner_message("Failed to load advertisements."), "Failed to load advertisements.");
    }
}
