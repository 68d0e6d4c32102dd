use crate::core::dedup::{DeduplicationGuard, idempotency_key};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn counting_op(counter: Arc<AtomicUsize>) -> impl std::future::Future<Output = u32> + Send {
    async move {
        counter.fetch_add(1, Ordering::SeqCst);
        42
    }
}

#[tokio::test]
async fn concurrent_identical_requests_execute_once() {
    let guard = DeduplicationGuard::new(Duration::from_secs(5), Duration::from_secs(1));
    let counter = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
        guard.run("key", counting_op(Arc::clone(&counter))),
        guard.run("key", counting_op(Arc::clone(&counter))),
    );

    assert_eq!((a, b), (42, 42));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_keys_execute_independently() {
    let guard = DeduplicationGuard::new(Duration::from_secs(5), Duration::from_secs(1));
    let counter = Arc::new(AtomicUsize::new(0));

    let (_, _) = tokio::join!(
        guard.run("key-a", counting_op(Arc::clone(&counter))),
        guard.run("key-b", counting_op(Arc::clone(&counter))),
    );

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn late_duplicates_get_the_retained_result_until_it_expires() {
    let guard = DeduplicationGuard::new(Duration::from_secs(5), Duration::from_millis(100));
    let counter = Arc::new(AtomicUsize::new(0));

    guard.run("key", counting_op(Arc::clone(&counter))).await;
    guard.run("key", counting_op(Arc::clone(&counter))).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    guard.run("key", counting_op(Arc::clone(&counter))).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn idempotency_keys_are_stable_and_collision_resistant() {
    let a = idempotency_key(&["alice", "wallet-1", "25", "fund"]);
    let b = idempotency_key(&["alice", "wallet-1", "25", "fund"]);
    let c = idempotency_key(&["alice", "wallet-1", "26", "fund"]);
    let d = idempotency_key(&["alice", "wallet-12", "5", "fund"]);

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_eq!(a.len(), 64);
}
