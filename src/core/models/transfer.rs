use serde::{Deserialize, Serialize};

/// One signer position on a transfer. Slot order is significant: the
/// fee payer must occupy slot 0 or the ledger rejects the transaction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignerSlot {
    pub address: String,
    pub signature: Option<String>,
}

/// A wallet-to-destination transfer in the shape the co-signing service
/// and the ledger expect. Serialization to/from wire bytes is the ledger
/// client's concern; the engine only inspects signer slots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferTransaction {
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub signers: Vec<SignerSlot>,
}

impl TransferTransaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        TransferTransaction {
            from: from.into(),
            to: to.into(),
            amount,
            signers: Vec::new(),
        }
    }

    /// Canonical byte message each signer signs over.
    pub fn signing_message(&self) -> Vec<u8> {
        format!("transfer:{}:{}:{}", self.from, self.to, self.amount).into_bytes()
    }

    /// True when `address` sits in the fixed fee-payer slot with a
    /// signature attached.
    pub fn fee_payer_slot_is(&self, address: &str) -> bool {
        self.signers
            .first()
            .map(|s| s.address == address && s.signature.is_some())
            .unwrap_or(false)
    }
}
