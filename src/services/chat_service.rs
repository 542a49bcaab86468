use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use crate::{
    dto::chat::{
        ChatMessageList, ConversationList, ConversationSummary, MarkedRead, SendMessageRequest,
    },
    entity::{
        chat_messages::{ActiveModel, Column, Entity as ChatMessages, Model as MessageModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::ChatMessage,
    realtime::RealtimeEvent,
    response::ApiResponse,
    routes::params::Pagination,
    state::AppState,
};

pub async fn send_message(
    state: &AppState,
    user: &AuthUser,
    payload: SendMessageRequest,
) -> AppResult<ApiResponse<ChatMessage>> {
    if payload.receiver_id == user.user_id {
        return Err(AppError::BadRequest("Cannot send a message to yourself".into()));
    }
    let receiver_exists = Users::find_by_id(payload.receiver_id)
        .count(&state.orm)
        .await?
        > 0;
    if !receiver_exists {
        return Err(AppError::NotFound);
    }

    let message = ActiveModel {
        id: Set(Uuid::new_v4()),
        sender_id: Set(user.user_id),
        receiver_id: Set(payload.receiver_id),
        content: Set(payload.content),
        read_at: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    let message = message_from_entity(message);

    state.hub.publish(
        message.receiver_id,
        RealtimeEvent::Chat {
            id: message.id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            created_at: message.created_at,
        },
    );

    Ok(ApiResponse::ok("Message sent", message))
}

/// Messages exchanged with `partner_id`, newest first.
pub async fn conversation(
    state: &AppState,
    user: &AuthUser,
    partner_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ChatMessageList>> {
    let page = pagination.normalize();
    let finder = ChatMessages::find()
        .filter(between(user.user_id, partner_id))
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(message_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Conversation",
        ChatMessageList { items },
        page,
        total,
    ))
}

pub async fn mark_conversation_read(
    state: &AppState,
    user: &AuthUser,
    partner_id: Uuid,
) -> AppResult<ApiResponse<MarkedRead>> {
    let result = ChatMessages::update_many()
        .col_expr(Column::ReadAt, Expr::value(Utc::now()))
        .filter(
            Condition::all()
                .add(Column::SenderId.eq(partner_id))
                .add(Column::ReceiverId.eq(user.user_id))
                .add(Column::ReadAt.is_null()),
        )
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::ok(
        "Marked as read",
        MarkedRead {
            updated: result.rows_affected,
        },
    ))
}

/// One entry per partner with the latest message and how many of theirs are unread.
pub async fn list_conversations(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ConversationList>> {
    let items = sqlx::query_as::<_, ConversationSummary>(
        r#"
        WITH msgs AS (
            SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS partner_id,
                   sender_id, content, read_at, created_at
            FROM chat_messages
            WHERE sender_id = $1 OR receiver_id = $1
        ),
        latest AS (
            SELECT DISTINCT ON (partner_id) partner_id, content, created_at
            FROM msgs
            ORDER BY partner_id, created_at DESC
        )
        SELECT l.partner_id,
               u.full_name AS partner_name,
               l.content AS last_message,
               l.created_at AS last_sent_at,
               (SELECT COUNT(*) FROM msgs m
                 WHERE m.partner_id = l.partner_id
                   AND m.sender_id = l.partner_id
                   AND m.read_at IS NULL) AS unread_count
        FROM latest l
        JOIN users u ON u.id = l.partner_id
        ORDER BY l.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::ok("Conversations", ConversationList { items }))
}

fn between(a: Uuid, b: Uuid) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(Column::SenderId.eq(a))
                .add(Column::ReceiverId.eq(b)),
        )
        .add(
            Condition::all()
                .add(Column::SenderId.eq(b))
                .add(Column::ReceiverId.eq(a)),
        )
}

fn message_from_entity(model: MessageModel) -> ChatMessage {
    ChatMessage {
        id: model.id,
        sender_id: model.sender_id,
        receiver_id: model.receiver_id,
        content: model.content,
        read_at: model.read_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
