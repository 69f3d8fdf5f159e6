use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;
use validator::Validate;

use application::dto::{
    ChatDto, ChatSummaryDto, InterestDto, InterestResolutionDto, MatchDto, MessageDto,
};
use application::{ResolveInterestRequest, SendInterestRequest, SendMessageRequest};
use domain::{InterestDecision, MessageType};

use crate::{
    auth::AuthUser, error::ApiError, state::AppState, ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct SendInterestPayload {
    from_pet_id: Uuid,
    target_pet_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ResolveInterestPayload {
    target_pet_id: Uuid,
    action: InterestDecision,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct SendMessagePayload {
    #[validate(length(max = 4000))]
    content: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    image_ref: Option<String>,
    message_type: Option<MessageType>,
    #[validate(length(min = 1, max = 128))]
    client_message_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct BlockPayload {
    target_user_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

fn validated<T: Validate>(payload: T) -> Result<T, ApiError> {
    payload.validate()?;
    Ok(payload)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// `*` 表示允许任意来源
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/interests", post(send_interest))
        .route("/interests/{interest_id}", put(resolve_interest))
        .route("/pets/{pet_id}/interests", get(list_incoming_interests))
        .route("/matches", get(list_matches))
        .route("/chats", get(list_chats))
        .route("/chats/{chat_id}", get(fetch_chat))
        .route("/chats/{chat_id}/messages", post(send_message))
        .route("/blocks", post(block_user))
        .route("/blocks/{target_user_id}", delete(unblock_user))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn send_interest(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendInterestPayload>,
) -> Result<(StatusCode, Json<InterestDto>), ApiError> {
    let payload = validated(payload)?;
    let dto = state
        .match_service
        .send_interest(SendInterestRequest {
            acting_user: user.id(),
            from_pet_id: payload.from_pet_id,
            target_pet_id: payload.target_pet_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn resolve_interest(
    State(state): State<AppState>,
    user: AuthUser,
    Path(interest_id): Path<Uuid>,
    Json(payload): Json<ResolveInterestPayload>,
) -> Result<Json<InterestResolutionDto>, ApiError> {
    let payload = validated(payload)?;
    let dto = state
        .match_service
        .resolve_interest(ResolveInterestRequest {
            acting_user: user.id(),
            target_pet_id: payload.target_pet_id,
            interest_id,
            action: payload.action,
        })
        .await?;

    Ok(Json(dto))
}

async fn list_incoming_interests(
    State(state): State<AppState>,
    user: AuthUser,
    Path(pet_id): Path<Uuid>,
) -> Result<Json<Vec<InterestDto>>, ApiError> {
    let items = state
        .match_service
        .list_incoming_interests(user.id(), pet_id)
        .await?;
    Ok(Json(items))
}

async fn list_matches(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<MatchDto>>, ApiError> {
    Ok(Json(state.match_service.list_matches(user.id()).await?))
}

async fn list_chats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ChatSummaryDto>>, ApiError> {
    Ok(Json(state.chat_service.list_chats(user.id()).await?))
}

async fn fetch_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<ChatDto>, ApiError> {
    Ok(Json(state.chat_service.fetch_chat(user.id(), chat_id).await?))
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let payload = validated(payload)?;
    let dto = state
        .chat_service
        .send_message(SendMessageRequest {
            chat_id,
            sender_id: user.id(),
            content: payload.content,
            image_ref: payload.image_ref,
            message_type: payload.message_type,
            client_message_id: payload.client_message_id,
        })
        .await?;

    // 推送失败只记日志，持久化结果已经确定
    let realtime = state.realtime.clone();
    let pushed = dto.clone();
    tokio::spawn(async move {
        realtime.publish_persisted(pushed).await;
    });

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn block_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BlockPayload>,
) -> Result<StatusCode, ApiError> {
    let payload = validated(payload)?;
    state
        .block_service
        .block(user.id(), payload.target_user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unblock_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(target_user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.block_service.unblock(user.id(), target_user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 浏览器无法为 WebSocket 设置请求头，token 可以放在查询参数里
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = match query.token {
        Some(token) => state.jwt_service.verify_token(&token)?.user_id,
        None => state.jwt_service.extract_user_from_headers(&headers)?,
    };
    let user = state.identity_service.authenticate(user_id).await?;

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(state, user.id).run(socket)))
}
