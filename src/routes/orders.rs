use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutRequest, OrderList, OrderWithDetails},
    error::AppResult,
    integrations::storage::StoredObject,
    middleware::{auth::AuthUser, validation::ValidatedJson},
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/{id}", get(get_order))
        .route("/{id}/cancel", post(cancel_order))
        .route(
            "/{id}/details/{detail_id}/certificate",
            get(download_certificate),
        )
        .route("/{id}/details/{detail_id}/artwork", get(download_artwork))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders of the current user", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order created from the cart", body = ApiResponse<OrderWithDetails>),
        (status = 400, description = "Empty cart or insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<OrderWithDetails>>> {
    let resp = order_service::checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with details", body = ApiResponse<OrderWithDetails>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithDetails>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled, stock restored", body = ApiResponse<Order>),
        (status = 400, description = "Order is not pending and unpaid"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/details/{detail_id}/certificate",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("detail_id" = Uuid, Path, description = "Order detail ID")
    ),
    responses(
        (status = 200, description = "Certificate of authenticity", content_type = "application/pdf"),
        (status = 403, description = "Order is not paid"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn download_certificate(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, detail_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let object = order_service::certificate(&state, &user, id, detail_id).await?;
    Ok(attachment(object, &format!("certificate-{detail_id}.pdf")))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/details/{detail_id}/artwork",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("detail_id" = Uuid, Path, description = "Order detail ID")
    ),
    responses(
        (status = 200, description = "Original artwork image", content_type = "application/octet-stream"),
        (status = 403, description = "Order is not paid"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn download_artwork(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, detail_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let object = order_service::original_artwork(&state, &user, id, detail_id).await?;
    Ok(attachment(object, &format!("artwork-{detail_id}")))
}

fn attachment(object: StoredObject, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, object.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        object.bytes,
    )
        .into_response()
}
