use serde::Serialize;
use thiserror::Error;

/// Engine-wide error taxonomy. Every exposed operation returns
/// `Result<T, EngineError>`; expected failures are values, not panics.
///
/// `Clone` is required because outcomes flow through the deduplication
/// guard's shared futures, where every coalesced caller receives its own
/// copy of the result.
#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed input: bad address, zero amount, wrong wallet kind.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requester holds the wrong role for the requested action.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Custody accessor check failed; decryption was never attempted.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The operation is valid but the wallet or participant is not in
    /// the expected state (already paid, already executed, closed).
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Wallet or bill lookup came back empty.
    #[error("not found: {0}")]
    NotFound(String),

    /// Key material is missing, undecryptable, or undecodable.
    #[error("custody failure: {0}")]
    Custody(String),

    /// Transfer submission or confirmation failed after bounded retries.
    #[error("ledger failure: {0}")]
    Ledger(String),

    /// Read-model mirror write failed. Never fatal to the caller.
    #[error("sync failure: {0}")]
    Sync(String),

    /// Backing store failure outside the ledger.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    /// Terminal errors are surfaced immediately and never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::Authorization(_)
                | EngineError::AccessDenied(_)
                | EngineError::StateConflict(_)
                | EngineError::NotFound(_)
        )
    }
}
