use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscussError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscussError {
    /// Short error code string, used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            DiscussError::Config(_) => "CONFIG_ERROR",
            DiscussError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscussError>;
