use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::users::{UpdateProfileRequest, UserList},
    entity::users::{ActiveModel, Column, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_ARTIST, ROLE_CUSTOMER, ensure_admin},
    models::User,
    response::ApiResponse,
    routes::params::UserListQuery,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let page = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(role) = query.role.as_ref().filter(|r| !r.is_empty()) {
        if ![ROLE_ADMIN, ROLE_ARTIST, ROLE_CUSTOMER].contains(&role.as_str()) {
            return Err(AppError::BadRequest("Unknown role".into()));
        }
        condition = condition.add(Column::Role.eq(role.clone()));
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(page.limit_u64())
        .offset(page.offset_u64())
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    Ok(ApiResponse::paginated(
        "Users",
        UserList { items },
        page,
        total,
    ))
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let found = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("User", user_from_entity(found)))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(full_name) = payload.full_name {
        active.full_name = Set(full_name.trim().to_string());
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }
    let updated = active.update(&state.orm).await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "profile_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.user_id })),
    )
    .await;

    Ok(ApiResponse::ok("Profile updated", user_from_entity(updated)))
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        full_name: model.full_name,
        phone: model.phone,
        role: model.role,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
