use domain::{
    Chat, Interest, InterestStatus, LastMessage, Match, MatchStatus, MeetupDetails, Message,
    MessageType, Timestamp, User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestDto {
    pub id: Uuid,
    pub from_pet_id: Uuid,
    pub status: InterestStatus,
    pub created_at: Timestamp,
}

impl From<&Interest> for InterestDto {
    fn from(interest: &Interest) -> Self {
        Self {
            id: Uuid::from(interest.id),
            from_pet_id: Uuid::from(interest.from),
            status: interest.status,
            created_at: interest.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDto {
    pub id: Uuid,
    pub pet1: Uuid,
    pub pet2: Uuid,
    pub status: MatchStatus,
    pub chat_id: Option<Uuid>,
    pub meetup_details: Option<MeetupDetails>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Match> for MatchDto {
    fn from(matched: &Match) -> Self {
        Self {
            id: Uuid::from(matched.id),
            pet1: Uuid::from(matched.pet1),
            pet2: Uuid::from(matched.pet2),
            status: matched.status,
            chat_id: matched.chat_id.map(Uuid::from),
            meetup_details: matched.meetup.clone(),
            created_at: matched.created_at,
            updated_at: matched.updated_at,
        }
    }
}

/// 兴趣处理结果；接受时带上匹配与聊天标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestResolutionDto {
    pub interest: InterestDto,
    pub match_id: Option<Uuid>,
    pub chat_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub seq: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: Uuid::from(message.id),
            chat_id: Uuid::from(message.chat_id),
            seq: message.seq,
            sender_id: Uuid::from(message.sender_id),
            content: message.content.clone(),
            message_type: message.message_type,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageDto {
    pub content: String,
    pub sender: Uuid,
    pub timestamp: Timestamp,
}

impl From<&LastMessage> for LastMessageDto {
    fn from(last: &LastMessage) -> Self {
        Self {
            content: last.content.clone(),
            sender: Uuid::from(last.sender_id),
            timestamp: last.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub id: Uuid,
    /// 账户被删除后名字不可用
    pub name: Option<String>,
}

impl ParticipantDto {
    pub fn resolve(id: Uuid, user: Option<&User>) -> Self {
        Self {
            id,
            name: user.map(|user| user.name.clone()),
        }
    }
}

/// 单个聊天的完整视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    pub id: Uuid,
    pub match_id: Option<Uuid>,
    pub participants: Vec<ParticipantDto>,
    pub messages: Vec<MessageDto>,
    pub last_message: Option<LastMessageDto>,
    /// 仅供展示；真正的发送限制在每次发送时重新检查
    pub is_blocked: bool,
    pub created_at: Timestamp,
}

/// 会话列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummaryDto {
    pub id: Uuid,
    pub match_id: Option<Uuid>,
    pub participants: Vec<Uuid>,
    pub last_message: Option<LastMessageDto>,
    pub created_at: Timestamp,
}

impl From<&Chat> for ChatSummaryDto {
    fn from(chat: &Chat) -> Self {
        Self {
            id: Uuid::from(chat.id),
            match_id: chat.match_id.map(Uuid::from),
            participants: chat.participants.iter().copied().map(Uuid::from).collect(),
            last_message: chat.last_message.as_ref().map(LastMessageDto::from),
            created_at: chat.created_at,
        }
    }
}
