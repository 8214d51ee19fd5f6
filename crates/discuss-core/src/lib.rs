pub mod config;
pub mod error;
pub mod types;

pub use config::DiscussConfig;
pub use error::{DiscussError, Result};
pub use types::Channel;
