use crate::core::errors::EngineError;
use crate::infrastructure::ledger::{ConfirmationStatus, LedgerClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Poll the ledger until the transfer is final. Bounded attempts with a
/// timeout per attempt; there is no mid-flight cancellation once a
/// transfer has been submitted. Before a timed-out attempt is treated as
/// a failure, the signature is checked one last time: a slow
/// confirmation must never be mistaken for a missing transfer, or a
/// retry upstream would double-submit.
pub(crate) async fn await_confirmation(
    ledger: &Arc<dyn LedgerClient>,
    signature: &str,
    attempts: u32,
    timeout: Duration,
) -> Result<(), EngineError> {
    for attempt in 0..attempts.max(1) {
        match tokio::time::timeout(timeout, ledger.confirm(signature)).await {
            Ok(Ok(ConfirmationStatus::Confirmed)) => return Ok(()),
            Ok(Ok(ConfirmationStatus::Failed)) => {
                return Err(EngineError::Ledger(format!(
                    "transfer {} failed on-chain",
                    signature
                )));
            }
            Ok(Ok(status)) => {
                debug!(signature, attempt, ?status, "confirmation not final yet");
            }
            Ok(Err(err)) => {
                warn!(signature, attempt, %err, "confirmation poll errored");
            }
            Err(_) => {
                warn!(signature, attempt, "confirmation poll timed out");
            }
        }
        tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt + 1))).await;
    }

    // Final check: the transfer may have landed while we were polling.
    match ledger.confirm(signature).await {
        Ok(ConfirmationStatus::Confirmed) => Ok(()),
        Ok(status) => Err(EngineError::Ledger(format!(
            "transfer {} unconfirmed after {} attempts (last status {:?})",
            signature, attempts, status
        ))),
        Err(err) => Err(EngineError::Ledger(format!(
            "transfer {} unconfirmed: {}",
            signature, err
        ))),
    }
}
