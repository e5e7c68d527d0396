//! Peach Payments hosted checkout.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{hmac_sha256, read_json, GatewayCode, Notification, PaymentError, PaymentGateway, PaymentRequest, PaymentSession, WebhookRequest};
use crate::domain::aggregates::tenant::constant_time_eq;
use crate::domain::PaymentOutcome;

#[derive(Debug, Clone, Deserialize)]
pub struct PeachCredentials {
    pub entity_id: String,
    pub access_token: String,
    pub secret_token: String,
}

pub struct PeachGateway {
    credentials: PeachCredentials,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    checkout_id: Option<String>,
    redirect_url: String,
}

impl PeachGateway {
    pub fn new(credentials: PeachCredentials, http: reqwest::Client, base_url: String) -> Self {
        Self { credentials, http, base_url }
    }

    /// Hex HMAC over every `key` + `value` pair sorted by key, `signature` excluded.
    pub fn signature_for(&self, params: &std::collections::BTreeMap<String, String>) -> Option<String> {
        let message: String = params.iter()
            .filter(|(k, _)| k.as_str() != "signature")
            .map(|(k, v)| format!("{k}{v}"))
            .collect();
        hmac_sha256(self.credentials.secret_token.trim().as_bytes(), message.as_bytes()).map(hex::encode)
    }
}

#[async_trait]
impl PaymentGateway for PeachGateway {
    fn code(&self) -> GatewayCode { GatewayCode::Peach }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let response = self.http
            .post(format!("{}/v2/checkout", self.base_url))
            .bearer_auth(self.credentials.access_token.trim())
            .json(&json!({
                "authentication": { "entityId": self.credentials.entity_id },
                "amount": req.amount.to_decimal_string(),
                "currency": req.amount.currency(),
                "merchantTransactionId": req.order_id.to_string(),
                "nonce": uuid::Uuid::now_v7().simple().to_string(),
                "shopperResultUrl": req.return_url,
                "cancelUrl": req.cancel_url,
                "notificationUrl": req.notify_url,
                "customer": { "email": req.customer_email, "givenName": req.customer_name },
            }))
            .send()
            .await?;
        let checkout: CheckoutResponse = read_json(GatewayCode::Peach, response).await?;
        Ok(PaymentSession { gateway: GatewayCode::Peach, redirect_url: checkout.redirect_url, reference: checkout.checkout_id })
    }

    fn verify_webhook(&self, webhook: &WebhookRequest) -> Result<(), PaymentError> {
        let params = webhook.params();
        let received = params.get("signature").ok_or(PaymentError::InvalidSignature)?;
        let expected = self.signature_for(&params).ok_or(PaymentError::InvalidSignature)?;
        if constant_time_eq(expected.as_bytes(), received.trim().to_ascii_lowercase().as_bytes()) {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature)
        }
    }
}

/// Maps a Peach result code to a payment outcome.
pub fn outcome_for(result_code: &str) -> PaymentOutcome {
    let code = result_code.trim();
    if code.starts_with("000.000.") || code.starts_with("000.100.1") || code.starts_with("000.3") || code.starts_with("000.6") {
        PaymentOutcome::Paid
    } else if code.starts_with("000.200") {
        PaymentOutcome::Pending
    } else if code == "100.396.101" {
        PaymentOutcome::Cancelled
    } else {
        PaymentOutcome::Failed
    }
}

pub(super) fn parse_notification(webhook: &WebhookRequest) -> Result<Notification, PaymentError> {
    let params = webhook.params();
    let order_reference = params.get("merchantTransactionId").filter(|v| !v.is_empty()).cloned()
        .ok_or_else(|| PaymentError::MalformedWebhook(GatewayCode::Peach, "missing merchantTransactionId".into()))?;
    let result_code = params.get("result.code")
        .ok_or_else(|| PaymentError::MalformedWebhook(GatewayCode::Peach, "missing result.code".into()))?;
    let payload = webhook.json().unwrap_or_else(|| serde_json::to_value(&params).unwrap_or_default());
    Ok(Notification {
        order_reference,
        outcome: outcome_for(result_code),
        gateway_reference: params.get("id").or_else(|| params.get("checkoutId")).cloned(),
        payload,
    })
}
