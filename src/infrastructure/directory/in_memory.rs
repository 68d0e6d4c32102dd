use crate::core::errors::EngineError;
use crate::infrastructure::directory::UserDirectory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    addresses: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_primary_address(&self, user_id: &str, address: &str) {
        let mut addresses = self.addresses.write().await;
        addresses.insert(user_id.to_string(), address.to_string());
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn primary_address(&self, user_id: &str) -> Result<Option<String>, EngineError> {
        let addresses = self.addresses.read().await;
        Ok(addresses.get(user_id).cloned())
    }
}
