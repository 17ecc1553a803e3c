//! Engine error types

use thiserror::Error;

use crate::TradeId;

/// Failures of a ledger transition. The input state is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("trade {0} is not an open position")]
    TradeNotFound(TradeId),

    #[error("invalid signal: {0}")]
    InvalidSignal(String),
}

/// Failures decoding or storing a persisted snapshot
#[derive(Debug, Error)]
pub enum StateError {
    #[error("corrupt state payload: {0}")]
    Corrupt(String),

    #[error("state payload checksum mismatch for {user_key}")]
    ChecksumMismatch { user_key: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl From<rusqlite::Error> for StateError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl StateError {
    /// Corrupt payloads are recoverable by reseeding; storage failures are not
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_) | Self::ChecksumMismatch { .. })
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
pub type StateResult<T> = Result<T, StateError>;
