pub mod console;
pub mod form;

pub use console::{AdminConsole, Banner};
pub use form::{CampaignForm, MediaUpload};
