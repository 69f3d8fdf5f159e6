use std::sync::Arc;
use std::time::Duration;

use domain::{Chat, ChatId, DomainError, MessageId, MessageType, NewMessage, UserId};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::{ChatDto, ChatSummaryDto, LastMessageDto, MessageDto, ParticipantDto},
    error::ApplicationError,
    idempotency::IdempotencyCache,
    repository::{ChatRepository, UserRepository},
    services::BlockService,
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub chat_id: Uuid,
    pub sender_id: Uuid, // 从JWT获取
    pub content: Option<String>,
    /// 已上传图片的引用；存在时消息类型为 image
    pub image_ref: Option<String>,
    pub message_type: Option<MessageType>,
    /// 客户端生成的幂等键，重试时复用
    pub client_message_id: Option<String>,
}

pub struct ChatServiceDependencies {
    pub chat_repository: Arc<dyn ChatRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub block_service: Arc<BlockService>,
    pub clock: Arc<dyn Clock>,
    pub idempotency_ttl: Duration,
}

/// 幂等键按 (发送者, 聊天, 客户端键) 划分；同一个槽位只会写入一次
type SendSlot = Arc<OnceCell<MessageDto>>;

pub struct ChatService {
    deps: ChatServiceDependencies,
    sent: IdempotencyCache<(UserId, ChatId, String), SendSlot>,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        let sent = IdempotencyCache::new(deps.idempotency_ttl);
        Self { deps, sent }
    }

    async fn participant_chat(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Chat, ApplicationError> {
        let chat = self
            .deps
            .chat_repository
            .find_by_id(chat_id)
            .await?
            .ok_or(DomainError::ChatNotFound)?;
        if !chat.is_participant(user_id) {
            return Err(DomainError::NotChatParticipant.into());
        }
        Ok(chat)
    }

    /// 持久化一条消息。屏蔽状态在每次发送时重新读取。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let chat_id = ChatId::from(request.chat_id);
        let sender_id = UserId::from(request.sender_id);

        let chat = self.participant_chat(chat_id, sender_id).await?;
        let other = chat
            .counterpart(sender_id)
            .ok_or(DomainError::NotChatParticipant)?;

        self.deps
            .block_service
            .status(sender_id, other)
            .await?
            .ensure_can_message()?;

        let message = NewMessage::compose(
            sender_id,
            request.content,
            request.image_ref,
            request.message_type,
        )?;

        let Some(client_key) = request.client_message_id else {
            return self.persist(chat_id, message).await;
        };

        // 先占住槽位再写入，同一个键的并发重试会等待第一次写入的结果
        let slot = self
            .sent
            .get_or_insert_with((sender_id, chat_id, client_key), SendSlot::default)
            .await;
        let mut persisted_here = false;
        let dto = slot
            .get_or_try_init(|| {
                persisted_here = true;
                self.persist(chat_id, message)
            })
            .await?;
        if !persisted_here {
            tracing::debug!(chat_id = %chat_id, message_id = %dto.id, "duplicate send collapsed");
        }
        Ok(dto.clone())
    }

    async fn persist(
        &self,
        chat_id: ChatId,
        message: NewMessage,
    ) -> Result<MessageDto, ApplicationError> {
        let persisted = self
            .deps
            .chat_repository
            .append_message(chat_id, MessageId::generate(), message, self.deps.clock.now())
            .await?;

        tracing::info!(
            chat_id = %chat_id,
            message_id = %persisted.id,
            seq = persisted.seq,
            "message persisted"
        );
        Ok(MessageDto::from(&persisted))
    }

    /// 返回聊天全文；is_blocked 仅作展示
    pub async fn fetch_chat(
        &self,
        user_id: Uuid,
        chat_id: Uuid,
    ) -> Result<ChatDto, ApplicationError> {
        let user_id = UserId::from(user_id);
        let chat = self.participant_chat(ChatId::from(chat_id), user_id).await?;

        let messages = self.deps.chat_repository.list_messages(chat.id).await?;
        let is_blocked = match chat.counterpart(user_id) {
            Some(other) => self.deps.block_service.is_blocked(user_id, other).await?,
            None => false,
        };

        let mut participants = Vec::with_capacity(chat.participants.len());
        for participant in chat.participants {
            let user = self.deps.user_repository.find_by_id(participant).await?;
            participants.push(ParticipantDto::resolve(
                Uuid::from(participant),
                user.as_ref(),
            ));
        }

        Ok(ChatDto {
            id: Uuid::from(chat.id),
            match_id: chat.match_id.map(Uuid::from),
            participants,
            messages: messages.iter().map(MessageDto::from).collect(),
            last_message: chat.last_message.as_ref().map(LastMessageDto::from),
            is_blocked,
            created_at: chat.created_at,
        })
    }

    pub async fn list_chats(&self, user_id: Uuid) -> Result<Vec<ChatSummaryDto>, ApplicationError> {
        let chats = self
            .deps
            .chat_repository
            .list_for_user(UserId::from(user_id))
            .await?;
        Ok(chats.iter().map(ChatSummaryDto::from).collect())
    }
}
