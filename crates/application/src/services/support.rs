//! 服务测试共用的夹具

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::{InterestDecision, Pet, PetId, User, UserId};
use uuid::Uuid;

use crate::{
    clock::ManualClock,
    dto::{InterestDto, InterestResolutionDto},
    error::ApplicationError,
    memory::MemoryStore,
    repository::ChatRepository,
    services::{
        BlockService, BlockServiceDependencies, ChatService, ChatServiceDependencies,
        MatchService, MatchServiceDependencies, ResolveInterestRequest, SendInterestRequest,
    },
};

pub(crate) struct Harness {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub matches: MatchService,
    pub chats: ChatService,
    pub blocks: Arc<BlockService>,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let chats: Arc<dyn ChatRepository> = Arc::new(store.clone());
        Self::with_chat_repository(store, chats)
    }

    /// 使用自定义的聊天仓储（例如会失败的 mock）
    pub fn with_chat_repository(store: MemoryStore, chats: Arc<dyn ChatRepository>) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let blocks = Arc::new(BlockService::new(BlockServiceDependencies {
            user_repository: Arc::new(store.clone()),
        }));
        let matches = MatchService::new(MatchServiceDependencies {
            pet_repository: Arc::new(store.clone()),
            interest_repository: Arc::new(store.clone()),
            match_repository: Arc::new(store.clone()),
            chat_repository: chats,
            clock: clock.clone(),
        });
        let chats = ChatService::new(ChatServiceDependencies {
            chat_repository: Arc::new(store.clone()),
            user_repository: Arc::new(store.clone()),
            block_service: blocks.clone(),
            clock: clock.clone(),
            idempotency_ttl: Duration::from_secs(60),
        });
        Self {
            store,
            clock,
            matches,
            chats,
            blocks,
        }
    }

    pub async fn user(&self, name: &str) -> UserId {
        let user = User::register(UserId::generate(), name, self.clock_now()).unwrap();
        let id = user.id;
        self.store.insert_user(user).await;
        id
    }

    pub async fn pet(&self, owner: UserId, name: &str) -> PetId {
        let pet = Pet::new(PetId::generate(), owner, name, "dog", self.clock_now()).unwrap();
        let id = pet.id;
        self.store.insert_pet(pet).await;
        id
    }

    pub async fn send_interest(
        &self,
        owner: UserId,
        from: PetId,
        target: PetId,
    ) -> Result<InterestDto, ApplicationError> {
        self.matches
            .send_interest(SendInterestRequest {
                acting_user: Uuid::from(owner),
                from_pet_id: Uuid::from(from),
                target_pet_id: Uuid::from(target),
            })
            .await
    }

    pub async fn resolve(
        &self,
        owner: UserId,
        target: PetId,
        interest_id: Uuid,
        action: InterestDecision,
    ) -> Result<InterestResolutionDto, ApplicationError> {
        self.matches
            .resolve_interest(ResolveInterestRequest {
                acting_user: Uuid::from(owner),
                target_pet_id: Uuid::from(target),
                interest_id,
                action,
            })
            .await
    }

    fn clock_now(&self) -> domain::Timestamp {
        crate::clock::Clock::now(self.clock.as_ref())
    }
}

/// 两位用户各有一只宠物，A 的宠物已向 B 的宠物发送兴趣并被接受
pub(crate) struct MatchedPair {
    pub owner_a: UserId,
    pub owner_b: UserId,
    pub pet_a: PetId,
    pub pet_b: PetId,
    pub chat_id: Uuid,
}

pub(crate) async fn matched_pair(harness: &Harness) -> MatchedPair {
    let owner_a = harness.user("alice").await;
    let owner_b = harness.user("bob").await;
    let pet_a = harness.pet(owner_a, "Rex").await;
    let pet_b = harness.pet(owner_b, "Luna").await;

    let interest = harness.send_interest(owner_a, pet_a, pet_b).await.unwrap();
    let resolution = harness
        .resolve(owner_b, pet_b, interest.id, InterestDecision::Accepted)
        .await
        .unwrap();

    MatchedPair {
        owner_a,
        owner_b,
        pet_a,
        pet_b,
        chat_id: resolution.chat_id.unwrap(),
    }
}
