use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failures surfaced to whoever drives the ledger. None of them are fatal; the caller
/// reports them and carries on.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A required field was blank or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("phone number already registered")]
    DuplicatePhone,

    #[error("invalid phone number or PIN")]
    InvalidCredentials,

    #[error("not found: {0}")]
    NotFound(String),

    /// An operation required a session and none was active.
    #[error("no active session")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access record {key}: {source}")]
    Io {
        key: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("record {key} is not valid JSON: {source}")]
    Serde {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Restoring an earlier record after a failed write also failed; the records named
    /// may now disagree.
    #[error("could not roll back {key} after a failed write: {reason}")]
    Rollback { key: &'static str, reason: String },

    /// Injected by the in-memory store in tests.
    #[error("write to {0} refused")]
    WriteRefused(&'static str),
}
