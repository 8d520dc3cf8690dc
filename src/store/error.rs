use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkStoreError {
    /// Any failure reported by SQLite. Not retried.
    #[error("link storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("unknown {column} code {value} in links table")]
    UnknownCode { column: &'static str, value: i64 },

    #[error("stored timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("invalid connection property `{0}`")]
    InvalidProperty(String),
}

pub type Result<T> = std::result::Result<T, LinkStoreError>;
