use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Payment;

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentLinkResponse {
    pub payment: Payment,
    pub checkout_url: String,
    pub qr_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}

/// Body returned to PayOS; any 2xx with this shape acknowledges the webhook.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub success: bool,
}
