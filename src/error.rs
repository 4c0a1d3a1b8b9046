use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database call exceeded {0:?}")]
    DatabaseTimeout(std::time::Duration),

    #[error("Cannot render column of type {0}")]
    UnsupportedColumn(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a question could not be turned into SQL.
///
/// The variants only exist for logging. The pipeline treats every one of
/// them as "translation unavailable".
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("model call exceeded {0} seconds")]
    Timeout(u64),

    #[error("model API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("model returned no choices")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, BotError>;
