use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageStoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be turned back into a record.
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// A previous holder of the connection panicked.
    #[error("database connection lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, MessageStoreError>;
