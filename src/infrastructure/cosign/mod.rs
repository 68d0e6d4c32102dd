use crate::core::errors::EngineError;
use crate::core::models::transfer::TransferTransaction;
use async_trait::async_trait;

/// Remote fee-payer signing service. Custodial wallets hold no network-fee
/// currency, so every outbound transfer needs the company co-signer's
/// signature before the ledger will accept it.
#[async_trait]
pub trait FeePayerCoSigner: Send + Sync {
    /// Returns the transaction with the fee payer's signature attached.
    /// The engine verifies the signer slot afterwards and never trusts
    /// the returned structure blindly.
    async fn co_sign(&self, tx: TransferTransaction) -> Result<TransferTransaction, EngineError>;

    fn fee_payer_address(&self) -> String;
}

pub mod local;
