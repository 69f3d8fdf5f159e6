use application::{dto::MessageDto, RealtimeSession, RelayOutcome};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{ChatId, UserId};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::state::AppState;

/// 客户端发来的帧，按 `event` 字段区分
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientFrame {
    JoinChat {
        #[serde(rename = "chatId")]
        chat_id: Uuid,
    },
    /// 转发一条已经持久化的消息
    SendMessage { payload: MessageDto },
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerFrame<'a> {
    ReceiveMessage { payload: &'a MessageDto },
}

/// 单个 WebSocket 连接
///
/// 会话状态只属于这个连接；加入房间时校验参与者身份，
/// 之后按会话加入的房间过滤广播。
pub struct WebSocketConnection {
    state: AppState,
    session: RealtimeSession,
}

impl WebSocketConnection {
    pub fn new(state: AppState, user_id: UserId) -> Self {
        Self {
            state,
            session: RealtimeSession::new(user_id),
        }
    }

    pub async fn run(mut self, socket: WebSocket) {
        let (mut sender, mut incoming) = socket.split();
        let mut events = self.state.realtime.subscribe();

        tracing::info!(
            session_id = %self.session.id(),
            user_id = %self.session.user_id(),
            "WebSocket 连接已建立"
        );

        loop {
            tokio::select! {
                message = incoming.next() => match message {
                    Some(Ok(WsMessage::Text(text))) => self.handle_frame(text.as_str()).await,
                    Some(Ok(WsMessage::Ping(data))) => {
                        if sender.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "WebSocket 读取失败");
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => {
                        if !self.session.should_receive(&event) {
                            continue;
                        }
                        let frame = ServerFrame::ReceiveMessage { payload: &event.message };
                        let payload = match serde_json::to_string(&frame) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to serialize websocket payload");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // 丢失的消息可以通过拉取聊天记录补回
                        tracing::warn!(
                            session_id = %self.session.id(),
                            skipped,
                            "realtime receiver lagged"
                        );
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::info!(
            session_id = %self.session.id(),
            joined = self.session.joined_count(),
            "WebSocket 连接已断开"
        );
    }

    /// 无法解析的帧直接忽略
    async fn handle_frame(&mut self, text: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed realtime frame");
                return;
            }
        };

        match frame {
            ClientFrame::JoinChat { chat_id } => {
                self.state
                    .realtime
                    .join(&mut self.session, ChatId::from(chat_id))
                    .await;
            }
            ClientFrame::SendMessage { payload } => {
                let outcome = self.state.realtime.relay(&self.session, payload).await;
                if let RelayOutcome::Delivered(receivers) = outcome {
                    tracing::debug!(receivers, "relayed realtime message");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_use_event_tags() {
        let chat_id = Uuid::new_v4();
        let frame: ClientFrame =
            serde_json::from_str(&format!(r#"{{"event":"join-chat","chatId":"{chat_id}"}}"#))
                .unwrap();
        assert!(matches!(frame, ClientFrame::JoinChat { chat_id: id } if id == chat_id));

        assert!(serde_json::from_str::<ClientFrame>(r#"{"event":"leave-chat"}"#).is_err());
    }

    #[test]
    fn server_frame_wraps_payload() {
        let message = MessageDto {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            seq: 3,
            sender_id: Uuid::new_v4(),
            content: "hi".into(),
            message_type: domain::MessageType::Text,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(ServerFrame::ReceiveMessage { payload: &message }).unwrap();
        assert_eq!(json["event"], "receive-message");
        assert_eq!(json["payload"]["seq"], 3);
        assert_eq!(json["payload"]["content"], "hi");
    }
}
