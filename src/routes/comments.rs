use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::comments::{CreateCommentRequest, ReplyList},
    error::AppResult,
    middleware::{auth::AuthUser, validation::ValidatedJson},
    models::CommentReply,
    response::ApiResponse,
    services::comment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", delete(delete_comment))
        .route("/{id}/replies", get(list_replies).post(reply_to_comment))
}

#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Comments"
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = comment_service::delete_comment(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/comments/{id}/replies",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Replies, oldest first", body = ApiResponse<ReplyList>),
        (status = 404, description = "Not Found")
    ),
    tag = "Comments"
)]
pub async fn list_replies(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReplyList>>> {
    let resp = comment_service::list_replies(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/comments/{id}/replies",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Reply created", body = ApiResponse<CommentReply>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Comments"
)]
pub async fn reply_to_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> AppResult<Json<ApiResponse<CommentReply>>> {
    let resp = comment_service::reply_to_comment(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
