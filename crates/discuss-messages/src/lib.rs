//! SQLite log of inbound prompts, one row per message relayed.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::MessageStoreError;
pub use store::MessageStore;
pub use types::MessageRecord;
