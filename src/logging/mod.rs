pub mod frame_log;
pub mod runtime_logger;

pub use frame_log::FrameLog;
pub use runtime_logger::RuntimeLogger;
