//! Advertisement scheduling and rotation for a job marketplace: popup and
//! pinned-fade selection, timed rotation, session dismissal, view/click
//! tracking, the admin preview and console, and a mock backend.

pub mod admin;
pub mod api;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mock_backend;
pub mod model;

pub use error::{AdError, Result};
