//! PayFast: redirect-only checkout signed with MD5, confirmed by ITN callbacks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::Deserialize;

use super::{GatewayCode, Notification, PaymentError, PaymentGateway, PaymentRequest, PaymentSession, WebhookRequest};
use crate::domain::aggregates::tenant::constant_time_eq;
use crate::domain::PaymentOutcome;

#[derive(Debug, Clone, Deserialize)]
pub struct PayFastCredentials {
    pub merchant_id: String,
    pub merchant_key: String,
    #[serde(default)]
    pub passphrase: Option<String>,
}

pub struct PayFastGateway {
    credentials: PayFastCredentials,
    process_url: String,
}

/// PHP `urlencode` style: spaces become `+`, reserved bytes are `%XX` upper-case.
fn pf_encode(value: &str) -> String {
    urlencoding::encode(value.trim()).replace("%20", "+")
}

fn param_string<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs.into_iter().map(|(k, v)| format!("{k}={}", pf_encode(v))).collect::<Vec<_>>().join("&")
}

fn md5_hex(input: &str) -> String { hex::encode(Md5::digest(input.as_bytes())) }

impl PayFastGateway {
    pub fn new(credentials: PayFastCredentials, process_url: String) -> Self { Self { credentials, process_url } }

    fn passphrase(&self) -> Option<&str> {
        self.credentials.passphrase.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    fn sign(&self, mut payload: String) -> String {
        if let Some(passphrase) = self.passphrase() {
            payload.push_str(&format!("&passphrase={}", pf_encode(passphrase)));
        }
        md5_hex(&payload)
    }

    /// Signature over ITN parameters: sorted by key, `signature` excluded, passphrase appended.
    pub fn itn_signature(&self, params: &BTreeMap<String, String>) -> String {
        let payload = param_string(params.iter().filter(|(k, _)| k.as_str() != "signature").map(|(k, v)| (k.as_str(), v.as_str())));
        self.sign(payload)
    }
}

#[async_trait]
impl PaymentGateway for PayFastGateway {
    fn code(&self) -> GatewayCode { GatewayCode::PayFast }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let order_id = req.order_id.to_string();
        let amount = req.amount.to_decimal_string();
        let first_name = req.customer_name.split_whitespace().next().unwrap_or_default();
        // PayFast signs fields in this exact order, skipping blanks.
        let fields = [
            ("merchant_id", self.credentials.merchant_id.as_str()),
            ("merchant_key", self.credentials.merchant_key.as_str()),
            ("return_url", req.return_url.as_str()),
            ("cancel_url", req.cancel_url.as_str()),
            ("notify_url", req.notify_url.as_str()),
            ("name_first", first_name),
            ("email_address", req.customer_email.as_str()),
            ("m_payment_id", order_id.as_str()),
            ("amount", amount.as_str()),
            ("item_name", req.description.as_str()),
        ];
        let query = param_string(fields.into_iter().filter(|(_, v)| !v.trim().is_empty()));
        let signature = self.sign(query.clone());
        Ok(PaymentSession {
            gateway: GatewayCode::PayFast,
            redirect_url: format!("{}?{}&signature={}", self.process_url, query, signature),
            reference: None,
        })
    }

    fn verify_webhook(&self, webhook: &WebhookRequest) -> Result<(), PaymentError> {
        let params = webhook.params();
        let received = params.get("signature").ok_or(PaymentError::InvalidSignature)?;
        if params.get("merchant_id").map(String::as_str) != Some(self.credentials.merchant_id.as_str()) {
            return Err(PaymentError::InvalidSignature);
        }
        let expected = self.itn_signature(&params);
        if constant_time_eq(expected.as_bytes(), received.trim().to_ascii_lowercase().as_bytes()) { Ok(()) } else { Err(PaymentError::InvalidSignature) }
    }
}

pub(super) fn parse_notification(webhook: &WebhookRequest) -> Result<Notification, PaymentError> {
    let params = webhook.params();
    let order_reference = params.get("m_payment_id").filter(|v| !v.is_empty()).cloned()
        .ok_or_else(|| PaymentError::MalformedWebhook(GatewayCode::PayFast, "missing m_payment_id".into()))?;
    let outcome = match params.get("payment_status").map(|s| s.to_ascii_uppercase()).as_deref() {
        Some("COMPLETE") => PaymentOutcome::Paid,
        Some("FAILED") => PaymentOutcome::Failed,
        Some("CANCELLED") => PaymentOutcome::Cancelled,
        _ => PaymentOutcome::Pending,
    };
    let payload = serde_json::to_value(&params).unwrap_or_default();
    Ok(Notification { order_reference, outcome, gateway_reference: params.get("pf_payment_id").cloned(), payload })
}
