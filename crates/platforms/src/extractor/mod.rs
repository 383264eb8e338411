pub mod error;
pub mod platform_extractor;
pub mod platforms;
mod default;

pub use default::{DEFAULT_UA, create_client_builder, default_client};
