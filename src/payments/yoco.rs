//! Yoco Checkout API with svix-style signed webhooks.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use super::{hmac_sha256, read_json, GatewayCode, Notification, PaymentError, PaymentGateway, PaymentRequest, PaymentSession, WebhookRequest};
use crate::domain::aggregates::tenant::constant_time_eq;
use crate::domain::PaymentOutcome;

#[derive(Debug, Clone, Deserialize)]
pub struct YocoCredentials {
    pub secret_key: String,
    /// `whsec_<base64>` signing secret of the webhook subscription.
    pub webhook_secret: String,
}

pub struct YocoGateway {
    credentials: YocoCredentials,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse { id: String, redirect_url: String }

impl YocoGateway {
    pub fn new(credentials: YocoCredentials, http: reqwest::Client, base_url: String) -> Self {
        Self { credentials, http, base_url }
    }

    fn signing_key(&self) -> Result<Vec<u8>, PaymentError> {
        let secret = self.credentials.webhook_secret.trim();
        STANDARD.decode(secret.strip_prefix("whsec_").unwrap_or(secret))
            .map_err(|e| PaymentError::InvalidCredentials(GatewayCode::Yoco, format!("webhook_secret: {e}")))
    }
}

/// Base64 HMAC-SHA256 of `<id>.<timestamp>.<body>`.
pub fn sign(key: &[u8], id: &str, timestamp: &str, body: &str) -> Option<String> {
    hmac_sha256(key, format!("{id}.{timestamp}.{body}").as_bytes()).map(|mac| STANDARD.encode(mac))
}

#[async_trait]
impl PaymentGateway for YocoGateway {
    fn code(&self) -> GatewayCode { GatewayCode::Yoco }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let response = self.http
            .post(format!("{}/api/checkouts", self.base_url))
            .bearer_auth(&self.credentials.secret_key)
            .json(&json!({
                "amount": req.amount.minor_units(),
                "currency": req.amount.currency(),
                "successUrl": req.return_url,
                "cancelUrl": req.cancel_url,
                "failureUrl": req.cancel_url,
                "metadata": { "orderId": req.order_id.to_string(), "orderNumber": req.order_number },
            }))
            .send()
            .await?;
        let checkout: CheckoutResponse = read_json(GatewayCode::Yoco, response).await?;
        Ok(PaymentSession { gateway: GatewayCode::Yoco, redirect_url: checkout.redirect_url, reference: Some(checkout.id) })
    }

    fn verify_webhook(&self, webhook: &WebhookRequest) -> Result<(), PaymentError> {
        let id = webhook.header("webhook-id").ok_or(PaymentError::InvalidSignature)?;
        let timestamp = webhook.header("webhook-timestamp").ok_or(PaymentError::InvalidSignature)?;
        let header = webhook.header("webhook-signature").ok_or(PaymentError::InvalidSignature)?;
        let key = self.signing_key()?;
        let expected = sign(&key, id, timestamp, webhook.body_str()).ok_or(PaymentError::InvalidSignature)?;

        let matched = header.split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .any(|(version, sig)| version == "v1" && constant_time_eq(sig.as_bytes(), expected.as_bytes()));
        if matched { Ok(()) } else { Err(PaymentError::InvalidSignature) }
    }
}

pub(super) fn parse_notification(webhook: &WebhookRequest) -> Result<Notification, PaymentError> {
    let malformed = |msg: &str| PaymentError::MalformedWebhook(GatewayCode::Yoco, msg.to_string());
    let json = webhook.json().ok_or_else(|| malformed("body is not a JSON object"))?;
    let event_type = json.get("type").and_then(|v| v.as_str()).unwrap_or_default();
    let payload = json.get("payload").cloned().unwrap_or_default();
    let order_reference = payload.pointer("/metadata/orderId").and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing payload.metadata.orderId"))?
        .to_string();
    let outcome = match event_type {
        "payment.succeeded" => PaymentOutcome::Paid,
        "payment.failed" => PaymentOutcome::Failed,
        "payment.cancelled" | "payment.canceled" => PaymentOutcome::Cancelled,
        _ => PaymentOutcome::Pending,
    };
    let gateway_reference = payload.get("id").and_then(|v| v.as_str()).map(str::to_string);
    Ok(Notification { order_reference, outcome, gateway_reference, payload: json })
}
