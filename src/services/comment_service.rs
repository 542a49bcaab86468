use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::comments::{CommentList, CommentWithReplies, CreateCommentRequest, ReplyList},
    entity::{
        comment_replies::{
            ActiveModel as ReplyActive, Column as ReplyCol, Entity as CommentReplies,
            Model as ReplyModel,
        },
        comments::{ActiveModel, Column, Entity as Comments, Model as CommentModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{Comment, CommentReply},
    response::{ApiResponse, empty_data},
    routes::params::Pagination,
    services::{
        notification_service::{KIND_COMMENT, notify_quietly},
        product_service::find_product,
    },
    state::AppState,
};

/// Newest comments first, each with its replies in posting order.
pub async fn list_comments(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<CommentList>> {
    find_product(state, product_id).await?;
    let page = pagination.normalize();

    let finder = Comments::find()
        .filter(Column::ProductId.eq(product_id))
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let comments = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
    let mut replies: HashMap<Uuid, Vec<CommentReply>> = HashMap::new();
    if !ids.is_empty() {
        for reply in CommentReplies::find()
            .filter(ReplyCol::CommentId.is_in(ids))
            .order_by_asc(ReplyCol::CreatedAt)
            .all(&state.orm)
            .await?
        {
            replies
                .entry(reply.comment_id)
                .or_default()
                .push(reply_from_entity(reply));
        }
    }

    let items = comments
        .into_iter()
        .map(|comment| CommentWithReplies {
            replies: replies.remove(&comment.id).unwrap_or_default(),
            comment: comment_from_entity(comment),
        })
        .collect();

    Ok(ApiResponse::paginated(
        "Comments",
        CommentList { items },
        page,
        total,
    ))
}

pub async fn create_comment(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateCommentRequest,
) -> AppResult<ApiResponse<Comment>> {
    let product = find_product(state, product_id).await?;

    let now = Utc::now();
    let comment = ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        user_id: Set(user.user_id),
        content: Set(payload.content.trim().to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    if product.artist_id != user.user_id {
        notify_quietly(
            state,
            product.artist_id,
            "New comment",
            &format!("Someone commented on \"{}\"", product.name),
            KIND_COMMENT,
        )
        .await;
    }

    record_audit(
        &state.pool,
        Some(user.user_id),
        "comment_create",
        Some("comments"),
        Some(serde_json::json!({ "comment_id": comment.id, "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::ok("Comment created", comment_from_entity(comment)))
}

pub async fn delete_comment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let comment = find_comment(state, id).await?;
    ensure_owner_or_admin(user, comment.user_id)?;

    Comments::delete_by_id(id).exec(&state.orm).await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "comment_delete",
        Some("comments"),
        Some(serde_json::json!({ "comment_id": id })),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", empty_data()))
}

pub async fn reply_to_comment(
    state: &AppState,
    user: &AuthUser,
    comment_id: Uuid,
    payload: CreateCommentRequest,
) -> AppResult<ApiResponse<CommentReply>> {
    let comment = find_comment(state, comment_id).await?;

    let reply = ReplyActive {
        id: Set(Uuid::new_v4()),
        comment_id: Set(comment_id),
        user_id: Set(user.user_id),
        content: Set(payload.content.trim().to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    if comment.user_id != user.user_id {
        notify_quietly(
            state,
            comment.user_id,
            "New reply",
            "Someone replied to your comment",
            KIND_COMMENT,
        )
        .await;
    }

    Ok(ApiResponse::ok("Reply created", reply_from_entity(reply)))
}

pub async fn list_replies(state: &AppState, comment_id: Uuid) -> AppResult<ApiResponse<ReplyList>> {
    find_comment(state, comment_id).await?;
    let items = CommentReplies::find()
        .filter(ReplyCol::CommentId.eq(comment_id))
        .order_by_asc(ReplyCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(reply_from_entity)
        .collect();
    Ok(ApiResponse::ok("Replies", ReplyList { items }))
}

async fn find_comment(state: &AppState, id: Uuid) -> AppResult<CommentModel> {
    Comments::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

fn comment_from_entity(model: CommentModel) -> Comment {
    Comment {
        id: model.id,
        product_id: model.product_id,
        user_id: model.user_id,
        content: model.content,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn reply_from_entity(model: ReplyModel) -> CommentReply {
    CommentReply {
        id: model.id,
        comment_id: model.comment_id,
        user_id: model.user_id,
        content: model.content,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
