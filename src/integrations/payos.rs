//! PayOS payment links and webhook signatures.
//!
//! Requests and webhook payloads are signed with HMAC-SHA256 using the merchant
//! checksum key. Payment requests sign a fixed set of fields; webhooks sign every
//! key of their `data` object in alphabetical order.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::PayosConfig;

type HmacSha256 = Hmac<Sha256>;

/// PayOS success code, used both for API responses and webhook results.
pub const SUCCESS_CODE: &str = "00";

/// PayOS rejects descriptions longer than this for bank transfers.
const MAX_DESCRIPTION_LEN: usize = 25;

#[derive(Debug, Error)]
pub enum PayosError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payos rejected request: {code} {desc}")]
    Rejected { code: String, desc: String },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid checksum key: {0}")]
    Key(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    cancel_url: &'a str,
    return_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    buyer_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buyer_email: Option<&'a str>,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    desc: String,
    data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub checkout_url: String,
    pub payment_link_id: String,
    pub qr_code: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookPayload {
    pub code: String,
    pub desc: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[schema(value_type = Object)]
    pub data: Value,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    pub order_code: i64,
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub payment_link_id: Option<String>,
    #[serde(default)]
    pub transaction_date_time: Option<String>,
    pub code: String,
    #[serde(default)]
    pub desc: Option<String>,
}

#[derive(Clone)]
pub struct PayosClient {
    http: reqwest::Client,
    config: PayosConfig,
}

impl PayosClient {
    pub fn new(http: reqwest::Client, config: PayosConfig) -> Self {
        Self { http, config }
    }

    pub fn checksum_key(&self) -> &str {
        &self.config.checksum_key
    }

    pub async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, PayosError> {
        let description = truncate_description(&request.description);
        let signature = sign_payment_request(
            &self.config.checksum_key,
            request.amount,
            &self.config.cancel_url,
            &description,
            request.order_code,
            &self.config.return_url,
        )?;
        let body = CreatePaymentBody {
            order_code: request.order_code,
            amount: request.amount,
            description: &description,
            cancel_url: &self.config.cancel_url,
            return_url: &self.config.return_url,
            buyer_name: request.buyer_name.as_deref(),
            buyer_email: request.buyer_email.as_deref(),
            signature,
        };

        let url = format!(
            "{}/v2/payment-requests",
            self.config.base_url.trim_end_matches('/')
        );
        let link: PaymentLink = self.send(self.http.post(url).json(&body)).await?;
        tracing::info!(
            order_code = request.order_code,
            payment_link_id = %link.payment_link_id,
            "payment link created"
        );
        Ok(link)
    }

    pub async fn cancel_payment_link(&self, order_code: i64, reason: &str) -> Result<(), PayosError> {
        let url = format!(
            "{}/v2/payment-requests/{}/cancel",
            self.config.base_url.trim_end_matches('/'),
            order_code
        );
        let _: Value = self
            .send(
                self.http
                    .post(url)
                    .json(&serde_json::json!({ "cancellationReason": reason })),
            )
            .await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PayosError> {
        let envelope: Envelope<T> = request
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if envelope.code != SUCCESS_CODE {
            return Err(PayosError::Rejected {
                code: envelope.code,
                desc: envelope.desc,
            });
        }
        envelope
            .data
            .ok_or_else(|| PayosError::Malformed("response has no data".into()))
    }
}

fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_DESCRIPTION_LEN).collect()
}

fn keyed_mac(key: &str) -> Result<HmacSha256, PayosError> {
    HmacSha256::new_from_slice(key.as_bytes()).map_err(|e| PayosError::Key(e.to_string()))
}

fn hmac_hex(key: &str, data: &str) -> Result<String, PayosError> {
    let mut mac = keyed_mac(key)?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn sign_payment_request(
    checksum_key: &str,
    amount: i64,
    cancel_url: &str,
    description: &str,
    order_code: i64,
    return_url: &str,
) -> Result<String, PayosError> {
    let data = format!(
        "amount={amount}&cancelUrl={cancel_url}&description={description}&orderCode={order_code}&returnUrl={return_url}"
    );
    hmac_hex(checksum_key, &data)
}

/// `key=value` pairs of a JSON object sorted by key and joined with `&`.
pub fn signature_data(data: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| format!("{}={}", key, signature_value(&data[key.as_str()])))
        .collect::<Vec<_>>()
        .join("&")
}

fn signature_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) if s == "null" || s == "undefined" => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
        other => other.to_string(),
    }
}

pub fn sign_data(checksum_key: &str, data: &Value) -> Result<String, PayosError> {
    let object = data
        .as_object()
        .ok_or_else(|| PayosError::Malformed("webhook data is not an object".into()))?;
    hmac_hex(checksum_key, &signature_data(object))
}

/// Checks the webhook signature and returns the typed `data` section.
pub fn verify_webhook(
    checksum_key: &str,
    payload: &WebhookPayload,
) -> Result<WebhookData, PayosError> {
    let object = payload
        .data
        .as_object()
        .ok_or_else(|| PayosError::Malformed("webhook data is not an object".into()))?;
    let expected = hex::decode(&payload.signature).map_err(|_| PayosError::InvalidSignature)?;

    let mut mac = keyed_mac(checksum_key)?;
    mac.update(signature_data(object).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| PayosError::InvalidSignature)?;

    serde_json::from_value(payload.data.clone()).map_err(|e| PayosError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn webhook(data: Value, key: &str) -> WebhookPayload {
        let signature = sign_data(key, &data).unwrap();
        WebhookPayload {
            code: SUCCESS_CODE.into(),
            desc: "success".into(),
            success: Some(true),
            data,
            signature,
        }
    }

    #[test]
    fn payment_request_signature_matches_known_vector() {
        let signature =
            sign_payment_request("checksum", 1000, "https://c", "ART1", 1, "https://r")
                .unwrap();
        assert_eq!(
            signature,
            "89fec5cf235dde4db4391843feaca93857c79be44fd807e07f3e0a0c8d603d82"
        );
    }

    #[test]
    fn signature_data_sorts_keys_and_blanks_nulls() {
        let data = json!({
            "orderCode": 123,
            "amount": 5000,
            "reference": null,
            "description": "ART123",
        });
        assert_eq!(
            signature_data(data.as_object().unwrap()),
            "amount=5000&description=ART123&orderCode=123&reference="
        );
    }

    #[test]
    fn verified_webhook_yields_typed_data() {
        let payload = webhook(
            json!({
                "orderCode": 1765432100123_i64,
                "amount": 250000,
                "description": "ART1765432100123",
                "paymentLinkId": "abc",
                "code": "00",
                "desc": "success",
                "reference": "FT123",
            }),
            "checksum",
        );

        let data = verify_webhook("checksum", &payload).unwrap();
        assert_eq!(data.order_code, 1765432100123);
        assert_eq!(data.amount, 250000);
        assert_eq!(data.payment_link_id.as_deref(), Some("abc"));
    }

    #[test]
    fn tampered_webhook_is_rejected() {
        let mut payload = webhook(
            json!({ "orderCode": 1, "amount": 1000, "code": "00" }),
            "checksum",
        );
        payload.data["amount"] = json!(1);

        assert!(matches!(
            verify_webhook("checksum", &payload),
            Err(PayosError::InvalidSignature)
        ));
        assert!(matches!(
            verify_webhook("other-key", &webhook(json!({ "orderCode": 1, "amount": 1, "code": "00" }), "checksum")),
            Err(PayosError::InvalidSignature)
        ));
    }

    #[test]
    fn descriptions_are_truncated() {
        let long = "A".repeat(40);
        assert_eq!(truncate_description(&long).len(), MAX_DESCRIPTION_LEN);
    }
}
