use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous chat id prefix {prefix}: {matches} chats match")]
    Ambiguous { prefix: String, matches: usize },

    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
