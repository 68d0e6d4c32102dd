use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a wallet's private key is held.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CustodyPolicy {
    /// Key lives in the creator's device-level secure store and never
    /// leaves the device. Used for Fair splits.
    DeviceBound,
    /// Key is symmetrically encrypted server-side so any accessor can
    /// request decryption. Used for Degen and Shared wallets.
    SharedVault,
}

/// Key-derivation scheme for SharedVault records. Records store their own
/// scheme version; both are supported indefinitely.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "version", rename_all = "UPPERCASE")]
pub enum VaultScheme {
    /// Legacy password-based derivation with a per-record iteration count.
    V1 { iterations: u32 },
    /// HMAC-based derivation from the wallet id and a server-held secret.
    V2,
}

/// How the decrypted plaintext encodes the key material. Written once at
/// creation time so retrieval never has to guess; records created before
/// tagging existed carry `None` and go through the legacy detector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyEncoding {
    /// Plaintext is a printable hex string of the key bytes.
    Text,
    /// Plaintext is base64 of the raw key bytes.
    Base64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultCiphertext {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub salt: Vec<u8>,
    pub scheme: VaultScheme,
    pub encoding: Option<KeyEncoding>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyCustodyRecord {
    pub wallet_id: Uuid,
    pub policy: CustodyPolicy,
    /// Present for SharedVault only; DeviceBound material never reaches
    /// server-side storage.
    pub vault: Option<VaultCiphertext>,
    /// User ids allowed to request decryption. For DeviceBound this is
    /// exactly the creator.
    pub accessors: Vec<String>,
}

impl KeyCustodyRecord {
    pub fn may_access(&self, user_id: &str) -> bool {
        self.accessors.iter().any(|a| a == user_id)
    }
}
