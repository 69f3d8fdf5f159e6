//! 孤儿匹配修复测试

use std::sync::Arc;

use chrono::Duration;
use config::RepairPolicy;
use domain::{InterestDecision, MatchStatus, RepositoryError};

use crate::{
    memory::MemoryStore,
    repository::MockChatRepository,
    services::{
        support::Harness, MatchRepairDependencies, MatchRepairService, RepairReport,
    },
};

/// 构造一个聊天创建失败的匹配，返回底层存储与其时钟所在的夹具
async fn orphaned() -> Harness {
    let store = MemoryStore::new();
    let mut chats = MockChatRepository::new();
    chats
        .expect_create_for_match()
        .returning(|_| Err(RepositoryError::storage("timeout")));
    let harness = Harness::with_chat_repository(store, Arc::new(chats));

    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;
    let interest = harness.send_interest(alice, rex, luna).await.unwrap();
    harness
        .resolve(bob, luna, interest.id, InterestDecision::Accepted)
        .await
        .unwrap_err();
    harness
}

fn repair(harness: &Harness, policy: RepairPolicy) -> MatchRepairService {
    let store = harness.store.clone();
    MatchRepairService::new(
        MatchRepairDependencies {
            pet_repository: Arc::new(store.clone()),
            match_repository: Arc::new(store.clone()),
            chat_repository: Arc::new(store),
            clock: harness.clock.clone(),
        },
        policy,
        Duration::seconds(30),
    )
}

#[tokio::test]
async fn test_fresh_orphans_are_left_alone() {
    let harness = orphaned().await;
    let report = repair(&harness, RepairPolicy::Retry).run_once().await.unwrap();

    assert_eq!(report, RepairReport::default());
    assert_eq!(harness.store.all_matches().await[0].chat_id, None);
}

#[tokio::test]
async fn test_retry_policy_creates_chat_once() {
    let harness = orphaned().await;
    harness.clock.advance(Duration::seconds(31));
    let service = repair(&harness, RepairPolicy::Retry);

    let report = service.run_once().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.repaired, 1);

    let matched = &harness.store.all_matches().await[0];
    let chats = harness.store.all_chats().await;
    assert_eq!(chats.len(), 1);
    assert_eq!(matched.chat_id, Some(chats[0].id));
    assert_eq!(matched.status, MatchStatus::Matched);

    // 已修复的匹配不会再次出现
    let report = service.run_once().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(harness.store.all_chats().await.len(), 1);
}

#[tokio::test]
async fn test_cancel_policy_cancels_orphan() {
    let harness = orphaned().await;
    harness.clock.advance(Duration::minutes(5));

    let report = repair(&harness, RepairPolicy::Cancel)
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.cancelled, 1);

    let matched = &harness.store.all_matches().await[0];
    assert_eq!(matched.status, MatchStatus::Cancelled);
    assert!(harness.store.all_chats().await.is_empty());
}
