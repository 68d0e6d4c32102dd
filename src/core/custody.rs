use crate::core::errors::EngineError;
use crate::core::models::custody::{
    CustodyPolicy, KeyCustodyRecord, KeyEncoding, VaultCiphertext, VaultScheme,
};
use crate::core::models::wallet::WalletKind;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::keystore::DeviceKeystore;
use crate::infrastructure::storage::WalletStore;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
// v1 records were written with the library's default memory cost; only
// the iteration count varies per record.
const V1_KDF_MEM_KIB: u32 = 19_456;

/// Encrypts, stores, and retrieves custodial wallet keys under one of two
/// policies: DeviceBound (Fair splits, key never leaves the creator's
/// device store) and SharedVault (Degen/Shared, server-side symmetric
/// encryption so any accessor can request decryption).
pub struct KeyCustodyService {
    store: Arc<dyn WalletStore>,
    keystore: Arc<dyn DeviceKeystore>,
    key_cache: TtlCache<Vec<u8>>,
    vault_secret: String,
}

impl KeyCustodyService {
    pub fn new(
        store: Arc<dyn WalletStore>,
        keystore: Arc<dyn DeviceKeystore>,
        key_cache_ttl: Duration,
        vault_secret: String,
    ) -> Self {
        KeyCustodyService {
            store,
            keystore,
            key_cache: TtlCache::new(key_cache_ttl),
            vault_secret,
        }
    }

    pub fn policy_for(kind: WalletKind) -> CustodyPolicy {
        match kind {
            WalletKind::Fair => CustodyPolicy::DeviceBound,
            WalletKind::Degen | WalletKind::Shared => CustodyPolicy::SharedVault,
        }
    }

    /// Persist key material for a new wallet. The custody record and any
    /// device-store entry succeed or fail as one unit; a partial write is
    /// undone before the error is reported.
    pub async fn store(
        &self,
        wallet_id: Uuid,
        kind: WalletKind,
        key_bytes: &[u8],
        creator_id: &str,
        accessors: Vec<String>,
    ) -> Result<(), EngineError> {
        let policy = Self::policy_for(kind);
        match policy {
            CustodyPolicy::DeviceBound => {
                let name = device_key_name(wallet_id, creator_id);
                self.keystore.put(&name, key_bytes).await?;
                let record = KeyCustodyRecord {
                    wallet_id,
                    policy,
                    vault: None,
                    accessors: vec![creator_id.to_string()],
                };
                if let Err(err) = self.store.save_custody_record(record).await {
                    self.keystore.delete(&name).await.ok();
                    return Err(EngineError::Custody(format!(
                        "custody record persist failed: {}",
                        err
                    )));
                }
            }
            CustodyPolicy::SharedVault => {
                let vault = self.seal(wallet_id, key_bytes)?;
                let record = KeyCustodyRecord {
                    wallet_id,
                    policy,
                    vault: Some(vault),
                    accessors,
                };
                self.store
                    .save_custody_record(record)
                    .await
                    .map_err(|err| {
                        EngineError::Custody(format!("custody record persist failed: {}", err))
                    })?;
            }
        }
        debug!(%wallet_id, ?policy, "custody material stored");
        Ok(())
    }

    /// Decrypt and return the wallet's key material for an authorized
    /// requester. The accessor check runs on every call, cache hit or
    /// not; only the decrypted bytes are ever cached.
    pub async fn retrieve(
        &self,
        wallet_id: Uuid,
        requester_id: &str,
    ) -> Result<Vec<u8>, EngineError> {
        let record = self
            .store
            .get_custody_record(wallet_id)
            .await?
            .ok_or_else(|| {
                EngineError::Custody(format!("no custody record for wallet {}", wallet_id))
            })?;

        if !record.may_access(requester_id) {
            warn!(%wallet_id, requester_id, "custody access rejected");
            return Err(EngineError::AccessDenied(format!(
                "user {} may not access keys for wallet {}",
                requester_id, wallet_id
            )));
        }

        let cache_key = wallet_id.to_string();
        if let Some(material) = self.key_cache.get(&cache_key).await {
            return Ok(material);
        }

        let material = match record.policy {
            CustodyPolicy::DeviceBound => {
                let creator = record.accessors.first().map(String::as_str).unwrap_or("");
                let name = device_key_name(wallet_id, creator);
                self.keystore.get(&name).await?.ok_or_else(|| {
                    EngineError::Custody(format!("device key missing for wallet {}", wallet_id))
                })?
            }
            CustodyPolicy::SharedVault => {
                let vault = record.vault.as_ref().ok_or_else(|| {
                    EngineError::Custody(format!("vault payload missing for wallet {}", wallet_id))
                })?;
                self.open(wallet_id, vault)?
            }
        };

        self.key_cache.insert(&cache_key, material.clone()).await;
        Ok(material)
    }

    /// Drop any cached plaintext for the wallet.
    pub async fn forget(&self, wallet_id: Uuid) {
        self.key_cache.remove(&wallet_id.to_string()).await;
    }

    fn seal(&self, wallet_id: Uuid, key_bytes: &[u8]) -> Result<VaultCiphertext, EngineError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut key = self.derive_key_v2(wallet_id, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = BASE64.encode(key_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| EngineError::Custody("vault encryption failed".to_string()))?;
        // best-effort zeroize
        key.iter_mut().for_each(|b| *b = 0);

        Ok(VaultCiphertext {
            ciphertext,
            nonce: nonce.to_vec(),
            salt: salt.to_vec(),
            scheme: VaultScheme::V2,
            encoding: Some(KeyEncoding::Base64),
        })
    }

    /// Legacy v1 writer. Kept so migration fixtures and tests can produce
    /// records in the exact shape older deployments left behind.
    pub(crate) fn seal_legacy_v1(
        &self,
        key_bytes: &[u8],
        iterations: u32,
        encoding: Option<KeyEncoding>,
    ) -> Result<VaultCiphertext, EngineError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let plaintext: Vec<u8> = match encoding {
            Some(KeyEncoding::Base64) => BASE64.encode(key_bytes).into_bytes(),
            Some(KeyEncoding::Text) | None => hex::encode(key_bytes).into_bytes(),
        };

        let mut key = self.derive_key_v1(&salt, iterations)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| EngineError::Custody("vault encryption failed".to_string()))?;
        key.iter_mut().for_each(|b| *b = 0);

        Ok(VaultCiphertext {
            ciphertext,
            nonce: nonce.to_vec(),
            salt: salt.to_vec(),
            scheme: VaultScheme::V1 { iterations },
            encoding,
        })
    }

    fn open(&self, wallet_id: Uuid, vault: &VaultCiphertext) -> Result<Vec<u8>, EngineError> {
        let mut key = match vault.scheme {
            VaultScheme::V2 => self.derive_key_v2(wallet_id, &vault.salt)?,
            VaultScheme::V1 { iterations } => self.derive_key_v1(&vault.salt, iterations)?,
        };

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&vault.nonce), vault.ciphertext.as_slice())
            .map_err(|_| EngineError::Custody("vault decryption failed".to_string()));
        key.iter_mut().for_each(|b| *b = 0);

        decode_key_material(&plaintext?, vault.encoding)
    }

    fn derive_key_v2(&self, wallet_id: Uuid, salt: &[u8]) -> Result<[u8; 32], EngineError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.vault_secret.as_bytes())
            .map_err(|_| EngineError::Custody("vault secret unusable".to_string()))?;
        mac.update(wallet_id.as_bytes());
        mac.update(salt);
        let digest = mac.finalize().into_bytes();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Ok(key)
    }

    fn derive_key_v1(&self, salt: &[u8], iterations: u32) -> Result<[u8; 32], EngineError> {
        let params = Params::new(V1_KDF_MEM_KIB, iterations.max(1), 1, None)
            .map_err(|e| EngineError::Custody(format!("bad v1 kdf params: {}", e)))?;
        let mut key = [0u8; 32];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(self.vault_secret.as_bytes(), salt, &mut key)
            .map_err(|e| EngineError::Custody(format!("v1 key derivation failed: {}", e)))?;
        Ok(key)
    }
}

fn device_key_name(wallet_id: Uuid, creator_id: &str) -> String {
    format!("custody/{}/{}", wallet_id, creator_id)
}

/// Decode decrypted vault plaintext into raw key bytes. Tagged records
/// decode directly; untagged records predate the tag and are probed
/// text-first, falling back when the text interpretation contains
/// control bytes. A wrong guess here would surface later as a signature
/// verification failure, so decoding errors are reported eagerly.
pub(crate) fn decode_key_material(
    plaintext: &[u8],
    encoding: Option<KeyEncoding>,
) -> Result<Vec<u8>, EngineError> {
    match encoding {
        Some(KeyEncoding::Text) => {
            let text = std::str::from_utf8(plaintext)
                .map_err(|_| EngineError::Custody("text-tagged key is not utf-8".to_string()))?;
            hex::decode(text.trim())
                .map_err(|_| EngineError::Custody("text-tagged key is not hex".to_string()))
        }
        Some(KeyEncoding::Base64) => {
            let text = std::str::from_utf8(plaintext)
                .map_err(|_| EngineError::Custody("base64-tagged key is not utf-8".to_string()))?;
            BASE64
                .decode(text.trim())
                .map_err(|_| EngineError::Custody("base64-tagged key is not base64".to_string()))
        }
        None => match std::str::from_utf8(plaintext) {
            Ok(text) if !text.chars().any(char::is_control) => {
                let trimmed = text.trim();
                if let Ok(bytes) = hex::decode(trimmed) {
                    return Ok(bytes);
                }
                BASE64.decode(trimmed).map_err(|_| {
                    EngineError::Custody("legacy key is neither hex nor base64".to_string())
                })
            }
            // Non-printable plaintext: the record held raw binary key
            // bytes written from a base64 payload.
            _ => Ok(plaintext.to_vec()),
        },
    }
}
