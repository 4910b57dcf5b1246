pub mod config_manager;

pub use config_manager::{normalize_origin, ConfigManager, DEFAULT_API_ORIGIN};
