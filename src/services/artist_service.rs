use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::record_audit,
    dto::artists::{BecomeArtistRequest, BecomeArtistResponse, UpdateArtistProfileRequest},
    entity::{
        artist_profiles::{
            ActiveModel as ProfileActive, Column as ProfileCol, Entity as ArtistProfiles,
            Model as ProfileModel,
        },
        users::{ActiveModel as UserActive, Entity as Users},
    },
    error::{AppError, AppResult, conflict_on_unique},
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_ARTIST, issue_token},
    models::ArtistProfile,
    response::ApiResponse,
    state::AppState,
};

/// Creates the caller's artist profile and promotes a customer to `artist`.
/// The returned token carries the new role so the caller can sell right away.
pub async fn become_artist(
    state: &AppState,
    user: &AuthUser,
    payload: BecomeArtistRequest,
) -> AppResult<ApiResponse<BecomeArtistResponse>> {
    let txn = state.orm.begin().await?;

    let account = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let profile = ProfileActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        display_name: Set(payload.display_name.trim().to_string()),
        bio: Set(payload.bio),
        avatar_url: Set(payload.avatar_url),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await
    .map_err(conflict_on_unique("Artist profile already exists"))?;

    // Admins keep their role; the profile alone lets them sell.
    if !user.is_admin() && account.role != ROLE_ARTIST {
        let mut active: UserActive = account.into();
        active.role = Set(ROLE_ARTIST.to_string());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    let role = if user.is_admin() { ROLE_ADMIN } else { ROLE_ARTIST };
    let token = issue_token(&state.config.jwt_secret, user.user_id, role)?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "artist_register",
        Some("artist_profiles"),
        Some(serde_json::json!({ "profile_id": profile.id })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Artist profile created",
        BecomeArtistResponse {
            profile: profile_from_entity(profile),
            token: format!("Bearer {}", token),
        },
    ))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateArtistProfileRequest,
) -> AppResult<ApiResponse<ArtistProfile>> {
    let existing = ArtistProfiles::find()
        .filter(ProfileCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ProfileActive = existing.into();
    if let Some(display_name) = payload.display_name {
        active.display_name = Set(display_name.trim().to_string());
    }
    if let Some(bio) = payload.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(avatar_url) = payload.avatar_url {
        active.avatar_url = Set(Some(avatar_url));
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        "artist_profile_update",
        Some("artist_profiles"),
        Some(serde_json::json!({ "profile_id": updated.id })),
    )
    .await;

    Ok(ApiResponse::ok("Profile updated", profile_from_entity(updated)))
}

pub async fn get_profile(state: &AppState, user_id: Uuid) -> AppResult<ApiResponse<ArtistProfile>> {
    let profile = ArtistProfiles::find()
        .filter(ProfileCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("Artist profile", profile_from_entity(profile)))
}

fn profile_from_entity(model: ProfileModel) -> ArtistProfile {
    ArtistProfile {
        id: model.id,
        user_id: model.user_id,
        display_name: model.display_name,
        bio: model.bio,
        avatar_url: model.avatar_url,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
