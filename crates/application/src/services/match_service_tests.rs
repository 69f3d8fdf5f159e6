//! 兴趣与匹配服务单元测试

use std::sync::Arc;

use domain::{DomainError, ErrorKind, InterestDecision, InterestStatus, PetPair, RepositoryError};
use futures::future::join_all;
use uuid::Uuid;

use crate::{
    error::ApplicationError,
    memory::MemoryStore,
    repository::{MatchRepository, MockChatRepository},
    services::support::{matched_pair, Harness},
};

fn kind(err: &ApplicationError) -> Option<ErrorKind> {
    err.kind()
}

#[tokio::test]
async fn test_accept_creates_match_and_chat() {
    let harness = Harness::new();
    let pair = matched_pair(&harness).await;

    let matches = harness.store.all_matches().await;
    assert_eq!(matches.len(), 1);
    let matched = &matches[0];
    assert_eq!(matched.pet1, pair.pet_a);
    assert_eq!(matched.pet2, pair.pet_b);
    assert_eq!(matched.chat_id.map(Uuid::from), Some(pair.chat_id));

    let chats = harness.store.all_chats().await;
    assert_eq!(chats.len(), 1);
    // 接受方在前，发起方在后
    assert_eq!(chats[0].participants, [pair.owner_b, pair.owner_a]);
    assert_eq!(chats[0].match_id, Some(matched.id));

    let pet = harness.store.pet(pair.pet_b).await.unwrap();
    assert_eq!(pet.interests[0].status, InterestStatus::Accepted);
}

#[tokio::test]
async fn test_reject_leaves_no_match_and_cannot_be_accepted_later() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;

    let interest = harness.send_interest(alice, rex, luna).await.unwrap();
    let rejected = harness
        .resolve(bob, luna, interest.id, InterestDecision::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.interest.status, InterestStatus::Rejected);
    assert_eq!(rejected.match_id, None);

    let err = harness
        .resolve(bob, luna, interest.id, InterestDecision::Accepted)
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::InvalidState));
    assert!(harness.store.all_matches().await.is_empty());
    assert!(harness.store.all_chats().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_interest_is_conflict() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;

    harness.send_interest(alice, rex, luna).await.unwrap();
    let err = harness.send_interest(alice, rex, luna).await.unwrap_err();

    assert_eq!(kind(&err), Some(ErrorKind::Conflict));
    assert_eq!(err.to_string(), "domain error: Interest already sent");
    assert_eq!(harness.store.pet(luna).await.unwrap().interests.len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_interests_store_one() {
    let harness = Arc::new(Harness::new());
    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;

    let attempts = (0..8).map(|_| {
        let harness = harness.clone();
        tokio::spawn(async move { harness.send_interest(alice, rex, luna).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(succeeded, 1);
    for err in results.iter().filter_map(|result| result.as_ref().err()) {
        assert_eq!(kind(err), Some(ErrorKind::Conflict));
    }
    assert_eq!(harness.store.pet(luna).await.unwrap().interests.len(), 1);
}

#[tokio::test]
async fn test_send_interest_preconditions() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let fido = harness.pet(alice, "Fido").await;
    let luna = harness.pet(bob, "Luna").await;

    // 使用别人的宠物发送
    let err = harness.send_interest(alice, luna, rex).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::PetNotOwned)));

    // 目标不存在
    let err = harness
        .send_interest(alice, rex, domain::PetId::generate())
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::NotFound));

    // 自己的宠物
    let err = harness.send_interest(alice, rex, fido).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::SelfInterest)));
    let err = harness.send_interest(alice, rex, rex).await.unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::InvalidOperation));

    // 目标未激活
    harness
        .store
        .insert_pet({
            let mut pet = harness.store.pet(luna).await.unwrap();
            pet.deactivate();
            pet
        })
        .await;
    let err = harness.send_interest(alice, rex, luna).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::PetInactive)));
    assert_eq!(kind(&err), Some(ErrorKind::InvalidState));
    assert!(harness.store.pet(luna).await.unwrap().interests.is_empty());
}

#[tokio::test]
async fn test_only_target_owner_can_resolve() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;
    let interest = harness.send_interest(alice, rex, luna).await.unwrap();

    let err = harness
        .resolve(alice, luna, interest.id, InterestDecision::Accepted)
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::Forbidden));

    let err = harness
        .resolve(bob, luna, Uuid::new_v4(), InterestDecision::Accepted)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::InterestNotFound)
    ));
}

#[tokio::test]
async fn test_concurrent_accepts_create_exactly_one_match() {
    let harness = Arc::new(Harness::new());
    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;
    let interest = harness.send_interest(alice, rex, luna).await.unwrap();

    let attempts = (0..6).map(|_| {
        let harness = harness.clone();
        tokio::spawn(async move {
            harness
                .resolve(bob, luna, interest.id, InterestDecision::Accepted)
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    for err in results.iter().filter_map(|result| result.as_ref().err()) {
        assert_eq!(kind(err), Some(ErrorKind::InvalidState));
    }
    assert_eq!(harness.store.all_matches().await.len(), 1);
    assert_eq!(harness.store.all_chats().await.len(), 1);
}

#[tokio::test]
async fn test_reciprocal_interests_converge_to_one_match() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;

    let to_luna = harness.send_interest(alice, rex, luna).await.unwrap();
    let to_rex = harness.send_interest(bob, luna, rex).await.unwrap();

    let first = harness
        .resolve(bob, luna, to_luna.id, InterestDecision::Accepted)
        .await
        .unwrap();
    let second = harness
        .resolve(alice, rex, to_rex.id, InterestDecision::Accepted)
        .await
        .unwrap();

    assert_eq!(first.match_id, second.match_id);
    assert_eq!(first.chat_id, second.chat_id);
    assert_eq!(second.interest.status, InterestStatus::Accepted);
    assert_eq!(harness.store.all_matches().await.len(), 1);
    assert_eq!(harness.store.all_chats().await.len(), 1);

    let stored = harness
        .store
        .find_by_pair(PetPair::new(rex, luna))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.pet1, rex);
}

#[tokio::test]
async fn test_list_matches_and_incoming_interests() {
    let harness = Harness::new();
    let pair = matched_pair(&harness).await;
    let carol = harness.user("carol").await;
    let milo = harness.pet(carol, "Milo").await;
    harness
        .send_interest(carol, milo, pair.pet_b)
        .await
        .unwrap();

    let for_a = harness
        .matches
        .list_matches(Uuid::from(pair.owner_a))
        .await
        .unwrap();
    let for_carol = harness
        .matches
        .list_matches(Uuid::from(carol))
        .await
        .unwrap();
    assert_eq!(for_a.len(), 1);
    assert!(for_carol.is_empty());

    let incoming = harness
        .matches
        .list_incoming_interests(Uuid::from(pair.owner_b), Uuid::from(pair.pet_b))
        .await
        .unwrap();
    assert_eq!(incoming.len(), 2);

    let err = harness
        .matches
        .list_incoming_interests(Uuid::from(carol), Uuid::from(pair.pet_b))
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::Forbidden));
}

#[tokio::test]
async fn test_chat_failure_leaves_detectable_orphan_match() {
    let store = MemoryStore::new();
    let mut chats = MockChatRepository::new();
    chats
        .expect_create_for_match()
        .times(1)
        .returning(|_| Err(RepositoryError::storage("connection reset")));
    let harness = Harness::with_chat_repository(store, Arc::new(chats));

    let alice = harness.user("alice").await;
    let bob = harness.user("bob").await;
    let rex = harness.pet(alice, "Rex").await;
    let luna = harness.pet(bob, "Luna").await;
    let interest = harness.send_interest(alice, rex, luna).await.unwrap();

    let err = harness
        .resolve(bob, luna, interest.id, InterestDecision::Accepted)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let matches = harness.store.all_matches().await;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].chat_id, None);

    // 兴趣已接受，重复提交得到 InvalidState，而不是第二个匹配
    let err = harness
        .resolve(bob, luna, interest.id, InterestDecision::Accepted)
        .await
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::InvalidState));
    assert_eq!(harness.store.all_matches().await.len(), 1);
}
