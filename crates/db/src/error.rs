use thiserror::Error;

/// Errors raised by the key-value stores and the record codecs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or create a store.
    #[error("failed to open store: {0}")]
    Open(String),
    /// A read against the backend failed.
    #[error("store read failed: {0}")]
    Read(String),
    /// A batch commit against the backend failed. The batch was not applied.
    #[error("store write failed: {0}")]
    Write(String),
    /// A persisted record failed to decode.
    #[error("malformed record: {0}")]
    Malformed(#[from] alloy_rlp::Error),
    /// The version sentinel file could not be read or written.
    #[error("version sentinel: {0}")]
    Version(String),
}
