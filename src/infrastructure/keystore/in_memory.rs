use crate::core::errors::EngineError;
use crate::infrastructure::keystore::DeviceKeystore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryKeystore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceKeystore for InMemoryKeystore {
    async fn put(&self, name: &str, material: &[u8]) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        entries.insert(name.to_string(), material.to_vec());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let entries = self.entries.read().await;
        Ok(entries.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        entries.remove(name);
        Ok(())
    }
}
