use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Collapses concurrent identical requests into one execution. While a
/// request is unresolved, later callers with the same key await the same
/// shared future; after resolution the result is retained briefly so a
/// late duplicate gets the cached outcome instead of a fresh attempt.
///
/// Also used to coalesce identical reads: N simultaneous lookups of one
/// wallet trigger exactly one underlying fetch.
pub struct DeduplicationGuard<T: Clone> {
    slots: Arc<Mutex<HashMap<String, Slot<T>>>>,
    in_flight_window: Duration,
    retention: Duration,
}

enum Slot<T: Clone> {
    InFlight {
        future: Shared<BoxFuture<'static, T>>,
        started: Instant,
    },
    Done {
        value: T,
        resolved: Instant,
    },
}

impl<T> DeduplicationGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(in_flight_window: Duration, retention: Duration) -> Self {
        DeduplicationGuard {
            slots: Arc::new(Mutex::new(HashMap::new())),
            in_flight_window,
            retention,
        }
    }

    /// Run `op` under `key`, or join whatever identical request is
    /// already running or recently finished.
    pub async fn run<F>(&self, key: &str, op: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let in_flight_window = self.in_flight_window;
            let retention = self.retention;
            slots.retain(|_, slot| match slot {
                Slot::InFlight { started, .. } => now.duration_since(*started) < in_flight_window,
                Slot::Done { resolved, .. } => now.duration_since(*resolved) < retention,
            });

            let joined = match slots.get(key) {
                Some(Slot::Done { value, .. }) => {
                    debug!(key, "dedup hit: returning retained result");
                    return value.clone();
                }
                Some(Slot::InFlight { future, .. }) => {
                    debug!(key, "dedup hit: joining in-flight request");
                    Some(future.clone())
                }
                None => None,
            };
            match joined {
                Some(future) => future,
                None => {
                    let shared = op.boxed().shared();
                    slots.insert(
                        key.to_string(),
                        Slot::InFlight {
                            future: shared.clone(),
                            started: now,
                        },
                    );
                    shared
                }
            }
        };

        let value = shared.await;

        let mut slots = self.slots.lock().await;
        if matches!(slots.get(key), Some(Slot::InFlight { .. })) {
            slots.insert(
                key.to_string(),
                Slot::Done {
                    value: value.clone(),
                    resolved: Instant::now(),
                },
            );
        }
        value
    }
}

/// Stable idempotency key over the identifying parts of a request.
pub fn idempotency_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
