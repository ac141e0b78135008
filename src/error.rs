use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("failed to fetch feed {url}: {reason}")]
    FeedFetch { url: String, reason: String },

    #[error("feed already exists: {0}")]
    FeedExists(String),

    #[error("item already exists: {0}")]
    DuplicateItem(String),

    #[error("item not found: {0}")]
    ItemNotFound(i64),

    #[error("invalid interest: {0}")]
    InvalidInterest(String),

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error("raindrop API error: {0}")]
    RaindropApi(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("OPML error: {0}")]
    Opml(#[from] opml::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Errors raised by a remote collaborator (feed host, embedding or
    /// bookmark provider) rather than by the local store.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            AppError::Http(_)
                | AppError::FeedParse(_)
                | AppError::FeedFetch { .. }
                | AppError::Embedding(_)
                | AppError::RaindropApi(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
