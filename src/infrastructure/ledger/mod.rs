use crate::core::errors::EngineError;
use crate::core::models::transfer::TransferTransaction;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Confirmed,
    Pending,
    Failed,
    /// The ledger has never seen this signature.
    Unknown,
}

/// On-chain primitives. Transaction encoding and RPC transport live on
/// the other side of this trait; the engine only deals in addresses,
/// amounts, and signatures.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a transfer the ledger signs on the payer's behalf (funding
    /// path, where the payer's own custodial account is the source).
    async fn submit_transfer(&self, from: &str, to: &str, amount: u64)
        -> Result<String, EngineError>;

    /// Submit a pre-signed, co-signed transfer (withdrawal path).
    async fn submit_signed(&self, tx: &TransferTransaction) -> Result<String, EngineError>;

    async fn get_balance(&self, address: &str) -> Result<u64, EngineError>;

    async fn confirm(&self, signature: &str) -> Result<ConfirmationStatus, EngineError>;

    /// Syntactic address validation. A database identifier must never
    /// pass this check.
    fn is_valid_address(&self, address: &str) -> bool;
}

pub mod in_memory;
