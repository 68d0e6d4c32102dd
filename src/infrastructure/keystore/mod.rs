use crate::core::errors::EngineError;
use async_trait::async_trait;

/// Device-level secure store (OS keychain / secure enclave) as seen from
/// the engine. DeviceBound key material goes in here under a name scoped
/// to the wallet and its creator, and never travels anywhere else.
#[async_trait]
pub trait DeviceKeystore: Send + Sync {
    async fn put(&self, name: &str, material: &[u8]) -> Result<(), EngineError>;
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, EngineError>;
    async fn delete(&self, name: &str) -> Result<(), EngineError>;
}

pub mod in_memory;
