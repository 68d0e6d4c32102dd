use crate::core::errors::EngineError;
use crate::core::models::audit::AuditRecord;
use async_trait::async_trait;

#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(
        &self,
        action: &str,
        details: serde_json::Value,
        actor_id: Option<&str>,
    ) -> Result<(), EngineError>;
    async fn records(&self) -> Result<Vec<AuditRecord>, EngineError>;
}

pub mod in_memory;
