use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::artists::{BecomeArtistRequest, BecomeArtistResponse, UpdateArtistProfileRequest},
    error::AppResult,
    middleware::{auth::AuthUser, validation::ValidatedJson},
    models::ArtistProfile,
    response::ApiResponse,
    services::artist_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(become_artist))
        .route("/me", put(update_profile))
        .route("/{user_id}", get(get_profile))
}

#[utoipa::path(
    post,
    path = "/api/artists",
    request_body = BecomeArtistRequest,
    responses(
        (status = 200, description = "Create artist profile for the caller", body = ApiResponse<BecomeArtistResponse>),
        (status = 409, description = "Artist profile already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Artists"
)]
pub async fn become_artist(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<BecomeArtistRequest>,
) -> AppResult<Json<ApiResponse<BecomeArtistResponse>>> {
    let resp = artist_service::become_artist(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/artists/me",
    request_body = UpdateArtistProfileRequest,
    responses(
        (status = 200, description = "Update own artist profile", body = ApiResponse<ArtistProfile>),
        (status = 404, description = "No artist profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Artists"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<UpdateArtistProfileRequest>,
) -> AppResult<Json<ApiResponse<ArtistProfile>>> {
    let resp = artist_service::update_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/artists/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID of the artist")),
    responses(
        (status = 200, description = "Public artist profile", body = ApiResponse<ArtistProfile>),
        (status = 404, description = "Not Found")
    ),
    tag = "Artists"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ArtistProfile>>> {
    let resp = artist_service::get_profile(&state, user_id).await?;
    Ok(Json(resp))
}
