//! 内存存储实现
//!
//! 所有仓储共享同一把写锁，因此每个仓储方法都是一个原子单元。
//! 用于测试以及 `storage.backend = "memory"` 的本地运行。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    BlockStatus, Chat, ChatId, Interest, InterestDecision, InterestId, Match, MatchId,
    MatchStatus, Message, MessageId, NewMessage, Pet, PetId, PetPair, RepositoryError, Timestamp,
    User, UserId,
};
use tokio::sync::RwLock;

use crate::repository::{
    ChatRepository, InterestRepository, MatchPlacement, MatchRepository, PetRepository,
    Repositories, Resolution, ResolveOutcome, UserRepository,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    pets: HashMap<PetId, Pet>,
    matches: HashMap<MatchId, Match>,
    chats: HashMap<ChatId, Chat>,
    messages: HashMap<ChatId, Vec<Message>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以同一份状态提供所有仓储
    pub fn repositories(&self) -> Repositories {
        let store = Arc::new(self.clone());
        Repositories {
            users: store.clone(),
            pets: store.clone(),
            interests: store.clone(),
            matches: store.clone(),
            chats: store,
        }
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn insert_pet(&self, pet: Pet) {
        self.state.write().await.pets.insert(pet.id, pet);
    }

    pub async fn update_user<F>(&self, id: UserId, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut User),
    {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        apply(user);
        Ok(())
    }

    pub async fn pet(&self, id: PetId) -> Option<Pet> {
        self.state.read().await.pets.get(&id).cloned()
    }

    pub async fn all_matches(&self) -> Vec<Match> {
        self.state.read().await.matches.values().cloned().collect()
    }

    pub async fn all_chats(&self) -> Vec<Chat> {
        self.state.read().await.chats.values().cloned().collect()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn add_block(&self, blocker: UserId, target: UserId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&blocker)
            .ok_or(RepositoryError::NotFound)?;
        user.block(target)
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        Ok(())
    }

    async fn remove_block(&self, blocker: UserId, target: UserId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(&blocker) {
            user.unblock(target);
        }
        Ok(())
    }

    async fn block_status(
        &self,
        viewer: UserId,
        other: UserId,
    ) -> Result<BlockStatus, RepositoryError> {
        let state = self.state.read().await;
        let has_blocked = |blocker: UserId, target: UserId| {
            state
                .users
                .get(&blocker)
                .map(|user| user.has_blocked(target))
                .unwrap_or(false)
        };
        Ok(BlockStatus {
            blocked_by_viewer: has_blocked(viewer, other),
            blocked_by_other: has_blocked(other, viewer),
        })
    }
}

#[async_trait]
impl PetRepository for MemoryStore {
    async fn find_by_id(&self, id: PetId) -> Result<Option<Pet>, RepositoryError> {
        Ok(self.state.read().await.pets.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Pet>, RepositoryError> {
        let state = self.state.read().await;
        let mut pets: Vec<Pet> = state
            .pets
            .values()
            .filter(|pet| pet.is_owned_by(owner))
            .cloned()
            .collect();
        pets.sort_by_key(|pet| pet.created_at);
        Ok(pets)
    }
}

#[async_trait]
impl InterestRepository for MemoryStore {
    async fn insert_if_absent(
        &self,
        target: PetId,
        interest: Interest,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let pet = state.pets.get_mut(&target).ok_or(RepositoryError::NotFound)?;
        if pet.interest_from(interest.from).is_some() {
            return Ok(false);
        }
        pet.interests.push(interest);
        Ok(true)
    }

    async fn resolve(
        &self,
        target: PetId,
        interest_id: InterestId,
        resolution: Resolution,
    ) -> Result<ResolveOutcome, RepositoryError> {
        let mut state = self.state.write().await;

        let Some(interest) = state
            .pets
            .get_mut(&target)
            .and_then(|pet| pet.interest_mut(interest_id))
        else {
            return Ok(ResolveOutcome::Missing);
        };
        if !interest.status.is_pending() {
            return Ok(ResolveOutcome::AlreadyProcessed(interest.status));
        }

        let decision = match &resolution {
            Resolution::Reject => InterestDecision::Rejected,
            Resolution::Accept { .. } => InterestDecision::Accepted,
        };
        interest
            .resolve(decision)
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        let interest = interest.clone();

        match resolution {
            Resolution::Reject => Ok(ResolveOutcome::Rejected(interest)),
            Resolution::Accept { candidate } => {
                let pair = candidate.pair();
                let existing = state
                    .matches
                    .values()
                    .find(|matched| matched.pair() == pair)
                    .cloned();
                let placement = match existing {
                    Some(matched) => MatchPlacement::Existing(matched),
                    None => {
                        state.matches.insert(candidate.id, candidate.clone());
                        MatchPlacement::Created(candidate)
                    }
                };
                Ok(ResolveOutcome::Accepted {
                    interest,
                    placement,
                })
            }
        }
    }
}

#[async_trait]
impl MatchRepository for MemoryStore {
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, RepositoryError> {
        Ok(self.state.read().await.matches.get(&id).cloned())
    }

    async fn find_by_pair(&self, pair: PetPair) -> Result<Option<Match>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .matches
            .values()
            .find(|matched| matched.pair() == pair)
            .cloned())
    }

    async fn list_for_pets(&self, pets: Vec<PetId>) -> Result<Vec<Match>, RepositoryError> {
        let state = self.state.read().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|matched| pets.iter().any(|pet| matched.involves(*pet)))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn attach_chat(
        &self,
        match_id: MatchId,
        chat_id: ChatId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let matched = state
            .matches
            .get_mut(&match_id)
            .ok_or(RepositoryError::NotFound)?;
        matched.attach_chat(chat_id, at);
        Ok(())
    }

    async fn list_without_chat(
        &self,
        created_before: Timestamp,
    ) -> Result<Vec<Match>, RepositoryError> {
        let state = self.state.read().await;
        let mut orphans: Vec<Match> = state
            .matches
            .values()
            .filter(|matched| {
                matched.status == MatchStatus::Matched
                    && matched.chat_id.is_none()
                    && matched.created_at <= created_before
            })
            .cloned()
            .collect();
        orphans.sort_by_key(|matched| matched.created_at);
        Ok(orphans)
    }

    async fn update_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let matched = state
            .matches
            .get_mut(&match_id)
            .ok_or(RepositoryError::NotFound)?;
        matched.set_status(status, at);
        Ok(())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn create_for_match(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(match_id) = chat.match_id {
            if let Some(existing) = state
                .chats
                .values()
                .find(|existing| existing.match_id == Some(match_id))
            {
                return Ok(existing.clone());
            }
        }
        if state.chats.contains_key(&chat.id) {
            return Err(RepositoryError::Conflict);
        }
        state.messages.insert(chat.id, Vec::new());
        state.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.state.read().await.chats.get(&id).cloned())
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Chat>, RepositoryError> {
        let state = self.state.read().await;
        let mut chats: Vec<Chat> = state
            .chats
            .values()
            .filter(|chat| chat.is_participant(user))
            .cloned()
            .collect();
        chats.sort_by_key(|chat| {
            std::cmp::Reverse(
                chat.last_message
                    .as_ref()
                    .map(|last| last.timestamp)
                    .unwrap_or(chat.created_at),
            )
        });
        Ok(chats)
    }

    async fn append_message(
        &self,
        chat_id: ChatId,
        id: MessageId,
        message: NewMessage,
        at: Timestamp,
    ) -> Result<Message, RepositoryError> {
        let mut state = self.state.write().await;
        let chat = state.chats.get_mut(&chat_id).ok_or(RepositoryError::NotFound)?;
        let message = Message::from_new(id, chat_id, chat.next_seq(), message, at);
        chat.record(&message);
        state
            .messages
            .entry(chat_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages = state.messages.get(&chat_id).cloned().unwrap_or_default();
        messages.sort_by_key(|message| message.seq);
        Ok(messages)
    }

    async fn find_message(
        &self,
        chat_id: ChatId,
        id: MessageId,
    ) -> Result<Option<Message>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .get(&chat_id)
            .and_then(|messages| messages.iter().find(|message| message.id == id))
            .cloned())
    }
}
