pub mod config;
pub mod error;
pub mod types;

pub use config::DocChatConfig;
pub use error::{DocChatError, Result};
pub use types::*;
