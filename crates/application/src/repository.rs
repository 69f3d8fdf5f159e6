use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    BlockStatus, Chat, ChatId, Interest, InterestId, InterestStatus, Match, MatchId, MatchStatus,
    Message, MessageId, NewMessage, Pet, PetId, PetPair, RepositoryError, Timestamp, User, UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    // 集合语义：重复屏蔽不产生新记录
    async fn add_block(&self, blocker: UserId, target: UserId) -> Result<(), RepositoryError>;

    async fn remove_block(&self, blocker: UserId, target: UserId) -> Result<(), RepositoryError>;

    /// 读取两人之间的屏蔽状态，每次调用都读取最新数据
    async fn block_status(
        &self,
        viewer: UserId,
        other: UserId,
    ) -> Result<BlockStatus, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PetRepository: Send + Sync {
    async fn find_by_id(&self, id: PetId) -> Result<Option<Pet>, RepositoryError>;
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Pet>, RepositoryError>;
}

/// 兴趣处理的写入意图
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Reject,
    /// 接受兴趣，并以 `candidate` 作为该宠物对尚无匹配时要插入的匹配
    Accept { candidate: Match },
}

/// 匹配写入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPlacement {
    /// 本次写入创建了匹配
    Created(Match),
    /// 宠物对已存在匹配，复用之
    Existing(Match),
}

impl MatchPlacement {
    pub fn into_match(self) -> Match {
        match self {
            MatchPlacement::Created(matched) | MatchPlacement::Existing(matched) => matched,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// 目标宠物或兴趣不存在
    Missing,
    /// 兴趣已不是 pending，本次未写入任何数据
    AlreadyProcessed(InterestStatus),
    Rejected(Interest),
    Accepted {
        interest: Interest,
        placement: MatchPlacement,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InterestRepository: Send + Sync {
    /// 以 (target, interest.from) 为唯一键插入兴趣。
    ///
    /// 已存在任意状态的同源兴趣时返回 `false` 且不写入。
    async fn insert_if_absent(
        &self,
        target: PetId,
        interest: Interest,
    ) -> Result<bool, RepositoryError>;

    /// 在一个原子单元内完成 pending 到终态的条件转换。
    ///
    /// 接受时同时按宠物对执行匹配的插入或复用；两个并发调用中至多一个观察到 pending。
    async fn resolve(
        &self,
        target: PetId,
        interest_id: InterestId,
        resolution: Resolution,
    ) -> Result<ResolveOutcome, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, RepositoryError>;
    async fn find_by_pair(&self, pair: PetPair) -> Result<Option<Match>, RepositoryError>;

    /// 涉及任一给定宠物的匹配，按创建时间倒序
    async fn list_for_pets(&self, pets: Vec<PetId>) -> Result<Vec<Match>, RepositoryError>;

    async fn attach_chat(
        &self,
        match_id: MatchId,
        chat_id: ChatId,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// 在 `created_before` 之前创建、仍为 matched 且没有聊天的匹配
    async fn list_without_chat(
        &self,
        created_before: Timestamp,
    ) -> Result<Vec<Match>, RepositoryError>;

    async fn update_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 以 match_id 为唯一键创建聊天；已存在时返回已有聊天
    async fn create_for_match(&self, chat: Chat) -> Result<Chat, RepositoryError>;

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError>;

    /// 用户参与的聊天，最近活跃的在前
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Chat>, RepositoryError>;

    // 分配序号、写入消息、刷新 last_message 在同一次写入里完成
    async fn append_message(
        &self,
        chat_id: ChatId,
        id: MessageId,
        message: NewMessage,
        at: Timestamp,
    ) -> Result<Message, RepositoryError>;

    /// 按序号升序返回
    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError>;

    async fn find_message(
        &self,
        chat_id: ChatId,
        id: MessageId,
    ) -> Result<Option<Message>, RepositoryError>;
}

/// 一个存储后端提供的全部仓储
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub pets: Arc<dyn PetRepository>,
    pub interests: Arc<dyn InterestRepository>,
    pub matches: Arc<dyn MatchRepository>,
    pub chats: Arc<dyn ChatRepository>,
}
