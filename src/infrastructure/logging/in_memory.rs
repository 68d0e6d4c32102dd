use crate::core::errors::EngineError;
use crate::core::models::audit::AuditRecord;
use crate::infrastructure::logging::AuditLogger;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryAuditLog {
    records: Arc<RwLock<Vec<AuditRecord>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLog {
    async fn record(
        &self,
        action: &str,
        details: serde_json::Value,
        actor_id: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut records = self.records.write().await;
        records.push(AuditRecord {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            actor_id: actor_id.map(String::from),
            details,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn records(&self) -> Result<Vec<AuditRecord>, EngineError> {
        let records = self.records.read().await;
        Ok(records.clone())
    }
}
