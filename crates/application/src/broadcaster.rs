use async_trait::async_trait;
use domain::ChatId;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::dto::MessageDto;
use crate::realtime::SessionId;

/// 推送给聊天房间的一条消息
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatBroadcast {
    pub chat_id: ChatId,
    pub message: MessageDto,
    /// 发起中继的会话；服务器在持久化后推送时为 None
    pub origin: Option<SessionId>,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    /// 返回收到广播的订阅者数量
    async fn broadcast(&self, payload: ChatBroadcast) -> Result<usize, BroadcastError>;

    fn subscribe(&self) -> broadcast::Receiver<ChatBroadcast>;
}
