use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::notifications::{NotificationList, UnreadCount},
    dto::chat::MarkedRead,
    entity::notifications::{ActiveModel, Column, Entity as Notifications, Model as NotificationModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Notification,
    realtime::RealtimeEvent,
    response::ApiResponse,
    routes::params::NotificationQuery,
    state::AppState,
};

pub const KIND_ORDER: &str = "order";
pub const KIND_PAYMENT: &str = "payment";
pub const KIND_SALE: &str = "sale";
pub const KIND_COMMENT: &str = "comment";

/// Persists a notification and pushes it to the user's live streams.
pub async fn notify(
    state: &AppState,
    user_id: Uuid,
    title: &str,
    message: &str,
    kind: &str,
) -> AppResult<Notification> {
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        title: Set(title.to_string()),
        message: Set(message.to_string()),
        kind: Set(kind.to_string()),
        is_read: Set(false),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    let notification = notification_from_entity(model);
    state.hub.publish(
        user_id,
        RealtimeEvent::Notification {
            id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind.clone(),
            created_at: notification.created_at,
        },
    );
    Ok(notification)
}

/// [`notify`] for side effects of another operation: failures are only logged.
pub async fn notify_quietly(state: &AppState, user_id: Uuid, title: &str, message: &str, kind: &str) {
    if let Err(err) = notify(state, user_id, title, message, kind).await {
        tracing::warn!(error = %err, user_id = %user_id, kind, "notification failed");
    }
}

pub async fn list_notifications(
    state: &AppState,
    user: &AuthUser,
    query: NotificationQuery,
) -> AppResult<ApiResponse<NotificationList>> {
    let page = query.pagination().normalize();
    let mut condition = Condition::all().add(Column::UserId.eq(user.user_id));
    if query.unread_only {
        condition = condition.add(Column::IsRead.eq(false));
    }

    let finder = Notifications::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(notification_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Notifications",
        NotificationList { items },
        page,
        total,
    ))
}

pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let existing = Notifications::find()
        .filter(
            Condition::all()
                .add(Column::Id.eq(id))
                .add(Column::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.is_read = Set(true);
    let updated = active.update(&state.orm).await?;

    Ok(ApiResponse::ok("Marked as read", notification_from_entity(updated)))
}

pub async fn mark_all_read(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<MarkedRead>> {
    let result = Notifications::update_many()
        .col_expr(Column::IsRead, sea_orm::sea_query::Expr::value(true))
        .filter(
            Condition::all()
                .add(Column::UserId.eq(user.user_id))
                .add(Column::IsRead.eq(false)),
        )
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::ok(
        "Marked all as read",
        MarkedRead {
            updated: result.rows_affected,
        },
    ))
}

pub async fn unread_count(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UnreadCount>> {
    let unread = Notifications::find()
        .filter(
            Condition::all()
                .add(Column::UserId.eq(user.user_id))
                .add(Column::IsRead.eq(false)),
        )
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::ok("Unread notifications", UnreadCount { unread }))
}

fn notification_from_entity(model: NotificationModel) -> Notification {
    Notification {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        message: model.message,
        kind: model.kind,
        is_read: model.is_read,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
