use thiserror::Error;

/// Failure to access the persisted session fields.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Session storage unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode session field: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors reported to callers of the accounts adapter.
#[derive(Error, Debug)]
pub enum AccountsError {
    /// The adapter only reports an existing session; it never signs in.
    #[error("No talemo session exists - sign in first")]
    NoSession,

    #[error(transparent)]
    Store(#[from] StoreError),
}
