use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ChatId, MatchId, MessageId, Timestamp, UserId};

/// 消息内容上限（字符数）
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// 图片消息在会话列表中的预览文本
pub const IMAGE_PREVIEW: &str = "Photo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            other => Err(DomainError::validation_error(
                "messageType",
                format!("unknown message type `{other}`"),
            )),
        }
    }
}

/// 待持久化的消息内容，已通过校验
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub content: String,
    pub message_type: MessageType,
}

impl NewMessage {
    /// 由客户端输入构造消息。
    ///
    /// 附带图片引用时消息类型为 image，内容为图片引用；否则要求非空文本。
    pub fn compose(
        sender_id: UserId,
        content: Option<String>,
        image_ref: Option<String>,
        message_type: Option<MessageType>,
    ) -> DomainResult<Self> {
        let image_ref = image_ref.filter(|value| !value.trim().is_empty());
        let (content, message_type) = match image_ref {
            Some(reference) => (reference, MessageType::Image),
            None => {
                let text = content.unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(DomainError::EmptyMessage);
                }
                (text, message_type.unwrap_or(MessageType::Text))
            }
        };

        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(DomainError::validation_error(
                "content",
                format!("must be at most {MAX_MESSAGE_CHARS} characters"),
            ));
        }

        Ok(Self {
            sender_id,
            content,
            message_type,
        })
    }

    pub fn text(sender_id: UserId, content: impl Into<String>) -> DomainResult<Self> {
        Self::compose(sender_id, Some(content.into()), None, None)
    }

    pub fn image(sender_id: UserId, image_ref: impl Into<String>) -> DomainResult<Self> {
        Self::compose(sender_id, None, Some(image_ref.into()), None)
    }

    pub fn preview(&self) -> String {
        preview_of(&self.content, self.message_type)
    }
}

fn preview_of(content: &str, message_type: MessageType) -> String {
    match message_type {
        MessageType::Image => IMAGE_PREVIEW.to_string(),
        MessageType::Text => content.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    /// 聊天内单调递增的序号，从 1 开始
    pub seq: i64,
    pub sender_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: Timestamp,
}

impl Message {
    pub fn from_new(
        id: MessageId,
        chat_id: ChatId,
        seq: i64,
        message: NewMessage,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            chat_id,
            seq,
            sender_id: message.sender_id,
            content: message.content,
            message_type: message.message_type,
            created_at: now,
        }
    }

    pub fn preview(&self) -> String {
        preview_of(&self.content, self.message_type)
    }
}

/// 会话列表里展示的最后一条消息摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: UserId,
    pub timestamp: Timestamp,
}

impl LastMessage {
    pub fn summarize(message: &Message) -> Self {
        Self {
            content: message.preview(),
            sender_id: message.sender_id,
            timestamp: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub participants: [UserId; 2],
    /// 匹配产生的聊天；每个匹配至多一个
    pub match_id: Option<MatchId>,
    pub last_message: Option<LastMessage>,
    pub message_count: i64,
    pub created_at: Timestamp,
}

impl Chat {
    pub fn for_match(
        id: ChatId,
        match_id: MatchId,
        first: UserId,
        second: UserId,
        now: Timestamp,
    ) -> DomainResult<Self> {
        if first == second {
            return Err(DomainError::validation_error(
                "participants",
                "a chat needs two distinct users",
            ));
        }
        Ok(Self {
            id,
            participants: [first, second],
            match_id: Some(match_id),
            last_message: None,
            message_count: 0,
            created_at: now,
        })
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// 对话中的另一方；user 不是参与者时返回 None
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        match self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }

    pub fn next_seq(&self) -> i64 {
        self.message_count + 1
    }

    /// 记录一条已分配序号的消息，同步刷新摘要
    pub fn record(&mut self, message: &Message) {
        self.message_count = self.message_count.max(message.seq);
        self.last_message = Some(LastMessage::summarize(message));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn image_messages_preview_as_photo() {
        let sender = UserId::generate();
        let chat = ChatId::generate();
        let image = NewMessage::image(sender, "uploads/cat.png").unwrap();
        assert_eq!(image.message_type, MessageType::Image);

        let message = Message::from_new(MessageId::generate(), chat, 1, image, Utc::now());
        assert_eq!(LastMessage::summarize(&message).content, IMAGE_PREVIEW);
        assert_eq!(message.content, "uploads/cat.png");
    }

    #[test]
    fn blank_text_is_rejected() {
        let sender = UserId::generate();
        assert_eq!(
            NewMessage::text(sender, "   "),
            Err(DomainError::EmptyMessage)
        );
        assert_eq!(
            NewMessage::compose(sender, None, Some(String::new()), None),
            Err(DomainError::EmptyMessage)
        );
    }

    #[test]
    fn oversized_text_is_rejected() {
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let err = NewMessage::text(UserId::generate(), long).unwrap_err();
        assert!(matches!(err, DomainError::ValidationError { .. }));
    }

    #[test]
    fn counterpart_and_record() {
        let a = UserId::generate();
        let b = UserId::generate();
        let mut chat =
            Chat::for_match(ChatId::generate(), MatchId::generate(), a, b, Utc::now()).unwrap();

        assert_eq!(chat.counterpart(a), Some(b));
        assert_eq!(chat.counterpart(UserId::generate()), None);

        let message = Message::from_new(
            MessageId::generate(),
            chat.id,
            chat.next_seq(),
            NewMessage::text(a, "hello").unwrap(),
            Utc::now(),
        );
        chat.record(&message);

        assert_eq!(chat.message_count, 1);
        assert_eq!(chat.next_seq(), 2);
        assert_eq!(chat.last_message.unwrap().content, "hello");
    }
}
