use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::chat::{ChatMessageList, ConversationList, MarkedRead, SendMessageRequest},
    error::AppResult,
    middleware::{auth::AuthUser, validation::ValidatedJson},
    models::ChatMessage,
    response::ApiResponse,
    routes::params::Pagination,
    services::chat_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations).post(send_message))
        .route("/{user_id}", get(conversation))
        .route("/{user_id}/read", post(mark_read))
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = ApiResponse<ChatMessage>),
        (status = 400, description = "Cannot message yourself"),
        (status = 404, description = "Receiver not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<ChatMessage>>> {
    let resp = chat_service::send_message(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/chat",
    responses(
        (status = 200, description = "Conversation partners with latest message and unread count", body = ApiResponse<ConversationList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ConversationList>>> {
    let resp = chat_service::list_conversations(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/chat/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Conversation partner"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Messages with the user, newest first", body = ApiResponse<ChatMessageList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ChatMessageList>>> {
    let resp = chat_service::conversation(&state, &user, user_id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chat/{user_id}/read",
    params(("user_id" = Uuid, Path, description = "Conversation partner")),
    responses(
        (status = 200, description = "Messages from the user marked read", body = ApiResponse<MarkedRead>)
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MarkedRead>>> {
    let resp = chat_service::mark_conversation_read(&state, &user, user_id).await?;
    Ok(Json(resp))
}
