//! 实时会话与房间中继
//!
//! 每个连接持有一个 [`RealtimeSession`]，记录它已加入的聊天房间。加入时校验参与者身份。
//! 客户端中继只转发已持久化、且由该会话用户发送的消息，广播内容取自存储而不是客户端载荷。

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use domain::{ChatId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::broadcaster::{ChatBroadcast, MessageBroadcaster};
use crate::dto::MessageDto;
use crate::error::ApplicationError;
use crate::idempotency::IdempotencyCache;
use crate::repository::ChatRepository;
use crate::services::BlockService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单个连接的实时状态，只属于该连接
#[derive(Debug)]
pub struct RealtimeSession {
    id: SessionId,
    user_id: UserId,
    joined: HashSet<ChatId>,
}

impl RealtimeSession {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: SessionId::generate(),
            user_id,
            joined: HashSet::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn has_joined(&self, chat_id: ChatId) -> bool {
        self.joined.contains(&chat_id)
    }

    pub fn joined_count(&self) -> usize {
        self.joined.len()
    }

    /// 该会话是否应该收到这条广播。
    ///
    /// 服务器推送来自 HTTP 发送，没有发起会话，因此按用户过滤：发送者的所有会话都收不到，
    /// 发送者的其他设备通过 fetchChat 或自己的客户端中继同步。
    pub fn should_receive(&self, event: &ChatBroadcast) -> bool {
        if !self.has_joined(event.chat_id) {
            return false;
        }
        match event.origin {
            Some(origin) => origin != self.id,
            None => Uuid::from(self.user_id) != event.message.sender_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered(usize),
    /// 会话没有加入该房间，静默丢弃
    NotJoined,
    /// 同一消息已经中继过
    Duplicate,
    /// 消息未持久化、不属于该会话用户，或双方之间存在屏蔽
    Rejected,
    Failed,
}

pub struct RealtimeService {
    chat_repository: Arc<dyn ChatRepository>,
    block_service: Arc<BlockService>,
    broadcaster: Arc<dyn MessageBroadcaster>,
    relayed: IdempotencyCache<MessageId, ()>,
}

impl RealtimeService {
    pub fn new(
        chat_repository: Arc<dyn ChatRepository>,
        block_service: Arc<BlockService>,
        broadcaster: Arc<dyn MessageBroadcaster>,
        relay_dedup_ttl: Duration,
    ) -> Self {
        Self {
            chat_repository,
            block_service,
            broadcaster,
            relayed: IdempotencyCache::new(relay_dedup_ttl),
        }
    }

    /// 加入聊天房间。聊天不存在或会话用户不是参与者时静默忽略，返回 false。
    pub async fn join(&self, session: &mut RealtimeSession, chat_id: ChatId) -> bool {
        match self.chat_repository.find_by_id(chat_id).await {
            Ok(Some(chat)) if chat.is_participant(session.user_id) => {
                session.joined.insert(chat_id);
                tracing::debug!(session_id = %session.id, chat_id = %chat_id, "joined chat room");
                true
            }
            Ok(_) => {
                tracing::debug!(
                    session_id = %session.id,
                    user_id = %session.user_id,
                    chat_id = %chat_id,
                    "join request dropped"
                );
                false
            }
            Err(err) => {
                tracing::warn!(chat_id = %chat_id, error = %err, "加入房间时读取聊天失败");
                false
            }
        }
    }

    /// 客户端发起的中继：只有已加入房间的会话才能向房间广播
    pub async fn relay(&self, session: &RealtimeSession, message: MessageDto) -> RelayOutcome {
        let chat_id = ChatId::from(message.chat_id);
        if !session.has_joined(chat_id) {
            tracing::debug!(session_id = %session.id, chat_id = %chat_id, "relay from unjoined session dropped");
            return RelayOutcome::NotJoined;
        }

        match self.verified_message(session, chat_id, MessageId::from(message.id)).await {
            Ok(Some(stored)) => self.fan_out(chat_id, stored, Some(session.id)).await,
            Ok(None) => {
                tracing::debug!(
                    session_id = %session.id,
                    chat_id = %chat_id,
                    message_id = %message.id,
                    "relay rejected"
                );
                RelayOutcome::Rejected
            }
            Err(err) => {
                tracing::warn!(chat_id = %chat_id, error = %err, "relay verification failed");
                RelayOutcome::Failed
            }
        }
    }

    /// 读取存储中的消息；发送者必须是会话用户，且双方当前没有屏蔽
    async fn verified_message(
        &self,
        session: &RealtimeSession,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<MessageDto>, ApplicationError> {
        let Some(stored) = self
            .chat_repository
            .find_message(chat_id, message_id)
            .await?
        else {
            return Ok(None);
        };
        if stored.sender_id != session.user_id {
            return Ok(None);
        }

        let Some(chat) = self.chat_repository.find_by_id(chat_id).await? else {
            return Ok(None);
        };
        if let Some(other) = chat.counterpart(session.user_id) {
            if self.block_service.is_blocked(session.user_id, other).await? {
                return Ok(None);
            }
        }
        Ok(Some(MessageDto::from(&stored)))
    }

    /// 持久化成功后由服务器推送给对方的在线会话
    pub async fn publish_persisted(&self, message: MessageDto) -> RelayOutcome {
        let chat_id = ChatId::from(message.chat_id);
        self.fan_out(chat_id, message, None).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatBroadcast> {
        self.broadcaster.subscribe()
    }

    async fn fan_out(
        &self,
        chat_id: ChatId,
        message: MessageDto,
        origin: Option<SessionId>,
    ) -> RelayOutcome {
        let message_id = MessageId::from(message.id);
        if !self.relayed.insert_if_absent(message_id, ()).await {
            return RelayOutcome::Duplicate;
        }

        let payload = ChatBroadcast {
            chat_id,
            message,
            origin,
        };
        match self.broadcaster.broadcast(payload).await {
            Ok(receivers) => RelayOutcome::Delivered(receivers),
            Err(err) => {
                tracing::warn!(chat_id = %chat_id, message_id = %message_id, error = %err, "广播消息失败");
                RelayOutcome::Failed
            }
        }
    }
}
