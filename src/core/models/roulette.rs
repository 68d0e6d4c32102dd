use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of a roulette execution. Written atomically with the
/// wallet's transition to `RouletteComplete`; no reader may observe one
/// without the other.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteAudit {
    /// Hex of the 32-byte seed the selection was derived from.
    pub seed: String,
    pub entropy_source_id: String,
    pub selected_loser_id: String,
    pub executed_by: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub executed_at: DateTime<Utc>,
}
