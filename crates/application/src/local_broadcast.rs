// 进程内广播器实现
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::broadcaster::{BroadcastError, ChatBroadcast, MessageBroadcaster};

pub const DEFAULT_BROADCAST_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct LocalMessageBroadcaster {
    sender: broadcast::Sender<ChatBroadcast>,
}

impl LocalMessageBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for LocalMessageBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

#[async_trait]
impl MessageBroadcaster for LocalMessageBroadcaster {
    async fn broadcast(&self, payload: ChatBroadcast) -> Result<usize, BroadcastError> {
        match self.sender.send(payload) {
            Ok(receivers) => Ok(receivers),
            // 没有订阅者说明没人在线，不算失败
            Err(_) => Ok(0),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatBroadcast> {
        self.sender.subscribe()
    }
}
