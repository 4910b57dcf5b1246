pub mod adapters;
pub mod campaign;
pub mod context;
pub mod placements;

pub use campaign::{AdMeta, Campaign, CampaignId, MediaSource};
pub use context::{PinnedMode, RendererConfig};
pub use placements::{Placement, Platform, Position};
