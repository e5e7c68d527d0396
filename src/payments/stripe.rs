//! Stripe Checkout Sessions and `Stripe-Signature` webhooks.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{read_json, verify_hex_hmac, GatewayCode, Notification, PaymentError, PaymentGateway, PaymentRequest, PaymentSession, WebhookRequest};
use crate::domain::PaymentOutcome;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCredentials {
    pub secret_key: String,
    pub webhook_secret: String,
}

pub struct StripeGateway {
    credentials: StripeCredentials,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CheckoutSession { id: String, url: String }

impl StripeGateway {
    pub fn new(credentials: StripeCredentials, http: reqwest::Client, base_url: String) -> Self {
        Self { credentials, http, base_url }
    }

    pub fn verify_signature(&self, payload: &str, header: &str, now: i64) -> Result<(), PaymentError> {
        let parts: HashMap<&str, &str> = header.split(',').filter_map(|part| part.trim().split_once('=')).collect();
        let timestamp = parts.get("t").ok_or(PaymentError::InvalidSignature)?;
        let received = parts.get("v1").ok_or(PaymentError::InvalidSignature)?;

        let signed_payload = format!("{timestamp}.{payload}");
        if !verify_hex_hmac(self.credentials.webhook_secret.as_bytes(), signed_payload.as_bytes(), received) {
            return Err(PaymentError::InvalidSignature);
        }
        let timestamp: i64 = timestamp.parse().map_err(|_| PaymentError::InvalidSignature)?;
        if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(PaymentError::InvalidSignature);
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn code(&self) -> GatewayCode { GatewayCode::Stripe }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let order_id = req.order_id.to_string();
        let form = [
            ("mode", "payment".to_string()),
            ("success_url", req.return_url.clone()),
            ("cancel_url", req.cancel_url.clone()),
            ("client_reference_id", order_id.clone()),
            ("customer_email", req.customer_email.clone()),
            ("metadata[order_id]", order_id),
            ("metadata[order_number]", req.order_number.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", req.amount.currency().to_ascii_lowercase()),
            ("line_items[0][price_data][unit_amount]", req.amount.minor_units().to_string()),
            ("line_items[0][price_data][product_data][name]", req.description.clone()),
        ];
        let response = self.http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .basic_auth(&self.credentials.secret_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await?;
        let session: CheckoutSession = read_json(GatewayCode::Stripe, response).await?;
        Ok(PaymentSession { gateway: GatewayCode::Stripe, redirect_url: session.url, reference: Some(session.id) })
    }

    fn verify_webhook(&self, webhook: &WebhookRequest) -> Result<(), PaymentError> {
        let header = webhook.header("stripe-signature").ok_or(PaymentError::InvalidSignature)?;
        self.verify_signature(webhook.body_str(), header, chrono::Utc::now().timestamp())
    }
}

pub(super) fn parse_notification(webhook: &WebhookRequest) -> Result<Notification, PaymentError> {
    let malformed = |msg: &str| PaymentError::MalformedWebhook(GatewayCode::Stripe, msg.to_string());
    let event = webhook.json().ok_or_else(|| malformed("body is not a JSON object"))?;
    let object = event.pointer("/data/object").cloned().unwrap_or_default();
    let order_reference = object.get("client_reference_id").and_then(|v| v.as_str())
        .or_else(|| object.pointer("/metadata/order_id").and_then(|v| v.as_str()))
        .ok_or_else(|| malformed("missing client_reference_id"))?
        .to_string();

    let outcome = match event.get("type").and_then(|v| v.as_str()).unwrap_or_default() {
        "checkout.session.completed" => match object.get("payment_status").and_then(|v| v.as_str()) {
            Some("paid") | Some("no_payment_required") => PaymentOutcome::Paid,
            _ => PaymentOutcome::Pending,
        },
        "checkout.session.async_payment_succeeded" => PaymentOutcome::Paid,
        "checkout.session.async_payment_failed" => PaymentOutcome::Failed,
        "checkout.session.expired" => PaymentOutcome::Cancelled,
        _ => PaymentOutcome::Pending,
    };
    let gateway_reference = object.get("payment_intent").and_then(|v| v.as_str())
        .or_else(|| object.get("id").and_then(|v| v.as_str()))
        .map(str::to_string);
    Ok(Notification { order_reference, outcome, gateway_reference, payload: event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::hmac_sha256;

    fn gateway() -> StripeGateway {
        StripeGateway::new(
            StripeCredentials { secret_key: "sk_test".into(), webhook_secret: "whsec_test".into() },
            reqwest::Client::new(),
            "http://localhost".into(),
        )
    }

    fn header_for(payload: &str, t: i64) -> String {
        let sig = hex::encode(hmac_sha256(b"whsec_test", format!("{t}.{payload}").as_bytes()).unwrap());
        format!("t={t},v1={sig}")
    }

    #[test]
    fn test_signature_and_tolerance() {
        let payload = r#"{"type":"checkout.session.completed"}"#;
        let gw = gateway();
        assert!(gw.verify_signature(payload, &header_for(payload, 1_700_000_000), 1_700_000_100).is_ok());
        assert!(gw.verify_signature(payload, &header_for(payload, 1_700_000_000), 1_700_000_301).is_err());
        assert!(gw.verify_signature("{}", &header_for(payload, 1_700_000_000), 1_700_000_000).is_err());
        assert!(gw.verify_signature(payload, "t=1700000000", 1_700_000_000).is_err());
    }

    #[test]
    fn test_parse_completed_session() {
        let body = r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_1","client_reference_id":"ord-1","payment_status":"paid","payment_intent":"pi_1"}}}"#;
        let hook = WebhookRequest { path: "/".into(), headers: Default::default(), body: body.into() };
        let n = parse_notification(&hook).unwrap();
        assert_eq!(n.order_reference, "ord-1");
        assert_eq!(n.outcome, PaymentOutcome::Paid);
        assert_eq!(n.gateway_reference.as_deref(), Some("pi_1"));
    }
}
