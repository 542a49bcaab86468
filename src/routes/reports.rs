use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::reports::{GenerateReportRequest, ReportList},
    error::AppResult,
    middleware::{auth::AuthUser, validation::ValidatedJson},
    models::FinancialReport,
    response::ApiResponse,
    routes::params::ReportQuery,
    services::report_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_reports).post(generate_report))
}

#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = GenerateReportRequest,
    responses(
        (status = 200, description = "Sales report for the period", body = ApiResponse<FinancialReport>),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn generate_report(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<GenerateReportRequest>,
) -> AppResult<Json<ApiResponse<FinancialReport>>> {
    let resp = report_service::generate_report(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reports",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("artist_id" = Option<uuid::Uuid>, Query, description = "Filter by artist (admin only)")
    ),
    responses(
        (status = 200, description = "Financial reports", body = ApiResponse<ReportList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<ApiResponse<ReportList>>> {
    let resp = report_service::list_reports(&state, &user, query).await?;
    Ok(Json(resp))
}
