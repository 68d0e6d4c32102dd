use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the domain audit trail. Settlement actions are money
/// movements; every one of them leaves a structured record regardless of
/// what the diagnostics logger is doing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub action: String,
    pub actor_id: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
