use crate::core::errors::EngineError;
use async_trait::async_trait;

/// Identity collaborator: resolves a user's primary in-app wallet
/// address. Session context and user records live outside this engine.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn primary_address(&self, user_id: &str) -> Result<Option<String>, EngineError>;
}

pub mod in_memory;
