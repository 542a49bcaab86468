use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::payments::{PaymentLinkResponse, PaymentList, WebhookAck},
    error::AppResult,
    integrations::payos::WebhookPayload,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/orders/{id}/payments",
            post(create_payment_link).get(list_payments),
        )
        .route("/payments/payos/webhook", post(payos_webhook))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/payments",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "PayOS checkout link for the order", body = ApiResponse<PaymentLinkResponse>),
        (status = 400, description = "Order is not pending and unpaid"),
        (status = 404, description = "Not Found"),
        (status = 503, description = "Payments are not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment_link(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentLinkResponse>>> {
    let resp = payment_service::create_payment_link(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/payments",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Payments of the order", body = ApiResponse<PaymentList>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_payments(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/payos/webhook",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Notification applied or already processed", body = ApiResponse<WebhookAck>),
        (status = 401, description = "Invalid signature"),
        (status = 404, description = "Unknown order code")
    ),
    tag = "Payments"
)]
pub async fn payos_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    let resp = payment_service::handle_webhook(&state, payload).await?;
    Ok(Json(resp))
}
