use crate::core::errors::EngineError;
use crate::core::lifecycle::CreateWalletRequest;
use crate::core::models::wallet::WalletKind;
use crate::infrastructure::storage::MirrorStore;
use crate::tests::{create_test_service, shares};
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn stale_mirror_is_repaired_on_read() {
    let h = create_test_service();
    h.fund_user("alice", 1_000).await;

    let wallet = h
        .service
        .create_wallet(CreateWalletRequest {
            bill_id: "bill-sync".to_string(),
            kind: WalletKind::Fair,
            creator_id: "carol".to_string(),
            participants: shares(&[("alice", 50)]),
            total_amount: 50,
        })
        .await
        .unwrap();

    // The mirror goes dark while the aggregate keeps moving. Funding
    // still succeeds: projection failures never block the money path.
    h.mirror.set_fail_writes(true).await;
    h.service.contribute(wallet.id, "alice", 50).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.mirror.set_fail_writes(false).await;

    // A read notices the divergence and repairs it.
    let summary = h.service.wallet_summary(wallet.id).await.unwrap();
    assert_eq!(summary.collected_amount, 50);
    assert_eq!(summary.percentage, 100.0);
    assert_eq!(summary.settled_count, 1);

    let mirrored = h.mirror.get_summary(wallet.id).await.unwrap().unwrap();
    assert_eq!(mirrored.collected_amount, summary.collected_amount);
    assert_eq!(mirrored.status, summary.status);
}

#[tokio::test]
async fn contribution_projects_into_the_mirror() {
    let h = create_test_service();
    h.fund_user("alice", 1_000).await;

    let wallet = h
        .service
        .create_wallet(CreateWalletRequest {
            bill_id: "bill-sync-2".to_string(),
            kind: WalletKind::Shared,
            creator_id: "alice".to_string(),
            participants: shares(&[("alice", 40)]),
            total_amount: 40,
        })
        .await
        .unwrap();
    h.service.contribute(wallet.id, "alice", 40).await.unwrap();

    // Let the fire-and-forget projection land.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let mirrored = h.mirror.get_summary(wallet.id).await.unwrap().unwrap();
    assert_eq!(mirrored.collected_amount, 40);
    assert_eq!(mirrored.participant_count, 1);
}

#[tokio::test]
async fn summary_of_an_unknown_wallet_is_not_found() {
    let h = create_test_service();
    let err = h.service.wallet_summary(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
