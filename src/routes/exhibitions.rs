use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::exhibitions::{CrawlSummary, ExhibitionList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::exhibition_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exhibitions))
        .route("/crawl", post(crawl_exhibitions))
}

#[utoipa::path(
    get,
    path = "/api/exhibitions",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Exhibitions, most recently crawled first", body = ApiResponse<ExhibitionList>)
    ),
    tag = "Exhibitions"
)]
pub async fn list_exhibitions(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ExhibitionList>>> {
    let resp = exhibition_service::list_exhibitions(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/exhibitions/crawl",
    responses(
        (status = 200, description = "Crawl the configured listing page (admin only)", body = ApiResponse<CrawlSummary>),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Listing page could not be fetched"),
        (status = 503, description = "No exhibition source configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Exhibitions"
)]
pub async fn crawl_exhibitions(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CrawlSummary>>> {
    let resp = exhibition_service::crawl_exhibitions(&state, &user).await?;
    Ok(Json(resp))
}
