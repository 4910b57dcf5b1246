pub mod dismissal;
pub mod preview;
pub mod renderer;
pub mod rotation;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod tracker;

pub use dismissal::{DismissalLedger, SessionDismissalLedger, POPUP_DISMISSED_KEY};
pub use preview::{PreviewCard, PreviewSimulator, TIMER_INFO};
pub use renderer::{AdSlot, LiveRenderer, PinnedLayout, PinnedView, PopupView, RenderFrame, RendererServices};
pub use rotation::{RotationPolicy, RotationState, TimedRotation};
pub use scheduler::RotationHandle;
pub use store::{CampaignStore, DEFAULT_POLL_INTERVAL};
pub use tracker::{AdTracker, Interaction, LinkOpener, LoggingOpener, NavigationRequest};
