use crate::core::errors::EngineError;
use crate::core::models::transfer::{SignerSlot, TransferTransaction};
use crate::infrastructure::cosign::FeePayerCoSigner;
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

/// In-process co-signer holding the fee payer's keypair. Stands in for
/// the remote signing service in the binary and the test suite.
pub struct LocalCoSigner {
    signing_key: SigningKey,
    address: String,
}

impl LocalCoSigner {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let address = hex::encode(signing_key.verifying_key().to_bytes());
        LocalCoSigner { signing_key, address }
    }
}

#[async_trait]
impl FeePayerCoSigner for LocalCoSigner {
    async fn co_sign(&self, mut tx: TransferTransaction) -> Result<TransferTransaction, EngineError> {
        let signature = self.signing_key.sign(&tx.signing_message());
        // Fee payer takes slot 0; existing signers shift down.
        tx.signers.insert(
            0,
            SignerSlot {
                address: self.address.clone(),
                signature: Some(hex::encode(signature.to_bytes())),
            },
        );
        Ok(tx)
    }

    fn fee_payer_address(&self) -> String {
        self.address.clone()
    }
}
