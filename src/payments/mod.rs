//! Payment gateway dispatch and webhook verification
//!
//! Each tenant configures one or more gateways (`tenant_gateways` rows holding
//! JSON credentials). Checkout picks a gateway by code, builds the adapter from
//! those credentials and makes exactly one outbound call. Webhooks are matched to
//! a gateway by payload shape, verified with the owning tenant's credentials and
//! applied to the order. There is no retry, idempotency key or reconciliation:
//! the latest callback wins.

mod ikhokha;
mod payfast;
mod peach;
mod stripe;
mod yoco;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Money, PaymentOutcome, PaymentStatus, TenantGateway};
use crate::error::{CommerceError, Result};
use crate::infra::{publish_all, EventPublisher};
use crate::store::Store;

pub use ikhokha::{IKhokhaCredentials, IKhokhaGateway};
pub use payfast::{PayFastCredentials, PayFastGateway};
pub use peach::{PeachCredentials, PeachGateway};
pub use stripe::{StripeCredentials, StripeGateway};
pub use yoco::{YocoCredentials, YocoGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayCode { PayFast, Yoco, Stripe, IKhokha, Peach }

impl GatewayCode {
    pub const ALL: [GatewayCode; 5] = [Self::PayFast, Self::Yoco, Self::Stripe, Self::IKhokha, Self::Peach];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayFast => "payfast",
            Self::Yoco => "yoco",
            Self::Stripe => "stripe",
            Self::IKhokha => "ikhokha",
            Self::Peach => "peach",
        }
    }

    /// Credential fields an admin must supply before the gateway can be enabled.
    pub fn required_credentials(&self) -> &'static [&'static str] {
        match self {
            Self::PayFast => &["merchant_id", "merchant_key"],
            Self::Yoco => &["secret_key", "webhook_secret"],
            Self::Stripe => &["secret_key", "webhook_secret"],
            Self::IKhokha => &["app_id", "app_secret"],
            Self::Peach => &["entity_id", "access_token", "secret_token"],
        }
    }
}

impl fmt::Display for GatewayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for GatewayCode {
    type Err = PaymentError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL.into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PaymentError::UnknownGateway(s.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("unknown payment gateway: {0}")]
    UnknownGateway(String),

    #[error("payment gateway {0} is not configured for this store")]
    NotConfigured(GatewayCode),

    #[error("invalid {0} credentials: {1}")]
    InvalidCredentials(GatewayCode, String),

    #[error("webhook signature verification failed")]
    InvalidSignature,

    #[error("unrecognised webhook payload")]
    UnrecognisedWebhook,

    #[error("malformed {0} webhook: {1}")]
    MalformedWebhook(GatewayCode, String),

    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} rejected the payment request: {1}")]
    Rejected(GatewayCode, String),
}

/// What checkout asks a gateway to collect.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: Money,
    pub customer_name: String,
    pub customer_email: String,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
    pub notify_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub gateway: GatewayCode,
    pub redirect_url: String,
    /// Gateway-side id of the checkout, when the gateway issues one up front.
    pub reference: Option<String>,
}

/// Raw inbound webhook as received over HTTP.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// Request path, used by gateways that sign `path + body`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WebhookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_str(&self) -> &str { std::str::from_utf8(&self.body).unwrap_or_default() }

    /// Body as a JSON object, if it is one.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice::<serde_json::Value>(&self.body).ok().filter(|v| v.is_object())
    }

    /// Flat, key-sorted parameters: form fields, or JSON leaves under dotted keys.
    pub fn params(&self) -> BTreeMap<String, String> {
        match self.json() {
            Some(json) => {
                let mut out = BTreeMap::new();
                flatten_json("", &json, &mut out);
                out
            }
            None => url::form_urlencoded::parse(&self.body).into_owned().collect(),
        }
    }
}

fn flatten_json(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                flatten_json(&key, v, out);
            }
        }
        Value::String(s) => { out.insert(prefix.to_string(), s.clone()); }
        Value::Null => { out.insert(prefix.to_string(), String::new()); }
        other => { out.insert(prefix.to_string(), other.to_string()); }
    }
}

/// Gateway-neutral reading of a webhook, before its signature is checked.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Our order id or order number as echoed back by the gateway.
    pub order_reference: String,
    pub outcome: PaymentOutcome,
    pub gateway_reference: Option<String>,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn code(&self) -> GatewayCode;
    async fn create_payment(&self, request: &PaymentRequest) -> std::result::Result<PaymentSession, PaymentError>;
    fn verify_webhook(&self, webhook: &WebhookRequest) -> std::result::Result<(), PaymentError>;
}

/// Base URLs of the gateway APIs; overridden in tests.
#[derive(Debug, Clone)]
pub struct GatewayEndpoints {
    pub payfast_live: String,
    pub payfast_sandbox: String,
    pub yoco: String,
    pub stripe: String,
    pub ikhokha: String,
    pub peach_live: String,
    pub peach_sandbox: String,
}

impl Default for GatewayEndpoints {
    fn default() -> Self {
        Self {
            payfast_live: "https://www.payfast.co.za/eng/process".to_string(),
            payfast_sandbox: "https://sandbox.payfast.co.za/eng/process".to_string(),
            yoco: "https://payments.yoco.com".to_string(),
            stripe: "https://api.stripe.com".to_string(),
            ikhokha: "https://api.ikhokha.com".to_string(),
            peach_live: "https://secure.peachpayments.com".to_string(),
            peach_sandbox: "https://testsecure.peachpayments.com".to_string(),
        }
    }
}

pub(crate) fn parse_credentials<T: DeserializeOwned>(code: GatewayCode, credentials: &serde_json::Value) -> std::result::Result<T, PaymentError> {
    serde_json::from_value(credentials.clone()).map_err(|e| PaymentError::InvalidCredentials(code, e.to_string()))
}

/// Checks that every required credential field is a non-empty string.
pub fn validate_credentials(code: GatewayCode, credentials: &serde_json::Value) -> std::result::Result<(), PaymentError> {
    let missing: Vec<&str> = code.required_credentials().iter().copied()
        .filter(|field| credentials.get(field).and_then(|v| v.as_str()).map_or(true, |v| v.trim().is_empty()))
        .collect();
    if missing.is_empty() { Ok(()) } else {
        Err(PaymentError::InvalidCredentials(code, format!("missing {}", missing.join(", "))))
    }
}

pub fn build_gateway(code: GatewayCode, config: &TenantGateway, http: reqwest::Client, endpoints: &GatewayEndpoints) -> std::result::Result<Box<dyn PaymentGateway>, PaymentError> {
    validate_credentials(code, &config.credentials)?;
    let test_mode = config.is_test_mode;
    Ok(match code {
        GatewayCode::PayFast => {
            let host = if test_mode { &endpoints.payfast_sandbox } else { &endpoints.payfast_live };
            Box::new(PayFastGateway::new(parse_credentials(code, &config.credentials)?, host.clone()))
        }
        GatewayCode::Yoco => Box::new(YocoGateway::new(parse_credentials(code, &config.credentials)?, http, endpoints.yoco.clone())),
        GatewayCode::Stripe => Box::new(StripeGateway::new(parse_credentials(code, &config.credentials)?, http, endpoints.stripe.clone())),
        GatewayCode::IKhokha => Box::new(IKhokhaGateway::new(parse_credentials(code, &config.credentials)?, http, endpoints.ikhokha.clone(), test_mode)),
        GatewayCode::Peach => {
            let base = if test_mode { &endpoints.peach_sandbox } else { &endpoints.peach_live };
            Box::new(PeachGateway::new(parse_credentials(code, &config.credentials)?, http, base.clone()))
        }
    })
}

/// Guesses the sending gateway from the payload shape.
pub fn detect_gateway(webhook: &WebhookRequest) -> Option<GatewayCode> {
    if webhook.header("stripe-signature").is_some() { return Some(GatewayCode::Stripe); }
    let json = webhook.json();
    if let Some(json) = &json {
        let is_payment_event = json.get("type").and_then(|t| t.as_str()).is_some_and(|t| t.starts_with("payment."));
        if webhook.header("webhook-signature").is_some() && is_payment_event { return Some(GatewayCode::Yoco); }
        if json.get("paylinkID").is_some() { return Some(GatewayCode::IKhokha); }
    }
    let params = webhook.params();
    if json.is_none() && params.contains_key("pf_payment_id") { return Some(GatewayCode::PayFast); }
    if params.contains_key("merchantTransactionId") && params.contains_key("result.code") { return Some(GatewayCode::Peach); }
    None
}

pub fn parse_notification(code: GatewayCode, webhook: &WebhookRequest) -> std::result::Result<Notification, PaymentError> {
    match code {
        GatewayCode::PayFast => payfast::parse_notification(webhook),
        GatewayCode::Yoco => yoco::parse_notification(webhook),
        GatewayCode::Stripe => stripe::parse_notification(webhook),
        GatewayCode::IKhokha => ikhokha::parse_notification(webhook),
        GatewayCode::Peach => peach::parse_notification(webhook),
    }
}

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Constant-time check of a hex-encoded HMAC-SHA256 signature.
pub(crate) fn verify_hex_hmac(key: &[u8], data: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else { return false };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else { return false };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

pub(crate) async fn read_json<T: DeserializeOwned>(code: GatewayCode, response: reqwest::Response) -> std::result::Result<T, PaymentError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(PaymentError::Rejected(code, format!("HTTP {status}: {body}")));
    }
    serde_json::from_str(&body).map_err(|e| PaymentError::Rejected(code, format!("unexpected response: {e}")))
}

/// Result of applying a verified webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
    pub gateway: GatewayCode,
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_status: PaymentStatus,
}

pub struct PaymentService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventPublisher>,
    http: reqwest::Client,
    endpoints: GatewayEndpoints,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>, http: reqwest::Client, endpoints: GatewayEndpoints) -> Self {
        Self { store, events, http, endpoints }
    }

    async fn load_gateway(&self, tenant_id: Uuid, code: GatewayCode, require_active: bool) -> Result<Box<dyn PaymentGateway>> {
        let config = self.store.get_gateway(tenant_id, code.as_str()).await?
            .filter(|g| g.is_active || !require_active)
            .ok_or(PaymentError::NotConfigured(code))?;
        Ok(build_gateway(code, &config, self.http.clone(), &self.endpoints)?)
    }

    /// Fails when the tenant has no active, well-formed configuration for `code`.
    pub async fn ensure_configured(&self, tenant_id: Uuid, code: GatewayCode) -> Result<()> {
        self.load_gateway(tenant_id, code, true).await.map(|_| ())
    }

    /// Creates a payment with the tenant's gateway. One attempt, no retries.
    pub async fn process_payment(&self, tenant_id: Uuid, code: GatewayCode, request: &PaymentRequest) -> Result<PaymentSession> {
        let gateway = self.load_gateway(tenant_id, code, true).await?;
        let session = gateway.create_payment(request).await.map_err(|e| {
            tracing::warn!(tenant = %tenant_id, gateway = %gateway.code(), order_id = %request.order_id, error = %e, "payment dispatch failed");
            e
        })?;
        tracing::info!(tenant = %tenant_id, gateway = %gateway.code(), order_id = %request.order_id, "payment session created");
        Ok(session)
    }

    /// Verifies a gateway callback and applies it to the order it references.
    pub async fn handle_webhook(&self, explicit: Option<GatewayCode>, webhook: &WebhookRequest) -> Result<WebhookReceipt> {
        let code = match explicit {
            Some(code) => code,
            None => detect_gateway(webhook).ok_or(PaymentError::UnrecognisedWebhook)?,
        };
        let notification = parse_notification(code, webhook)?;
        let mut order = self.store.find_order_by_reference(&notification.order_reference).await?
            .ok_or(CommerceError::NotFound("order"))?;

        let gateway = self.load_gateway(order.tenant_id, code, false).await?;
        if let Err(e) = gateway.verify_webhook(webhook) {
            tracing::warn!(tenant = %order.tenant_id, gateway = %code, order_id = %order.id, "rejected webhook with bad signature");
            return Err(e.into());
        }

        let applied = order.apply_payment(notification.outcome, notification.gateway_reference, notification.payload);
        if order.gateway_code.is_none() { order.gateway_code = Some(gateway.code().as_str().to_string()); }
        self.store.update_order(&order).await?;

        if applied.newly_paid {
            for item in &order.items {
                self.store.decrement_stock(order.tenant_id, item.product_id, item.quantity).await?;
            }
        }
        if let Some(tenant) = self.store.get_tenant(order.tenant_id).await? {
            publish_all(self.events.as_ref(), &tenant.slug, order.take_events()).await;
        }

        tracing::info!(
            tenant = %order.tenant_id, gateway = %code, order_id = %order.id,
            outcome = ?notification.outcome, newly_paid = applied.newly_paid, "payment webhook applied"
        );
        Ok(WebhookReceipt {
            received: true,
            gateway: code,
            order_id: order.id,
            order_number: order.order_number.clone(),
            payment_status: order.payment_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn webhook(headers: &[(&'static str, &'static str)], body: &str) -> WebhookRequest {
        let mut map = HeaderMap::new();
        for (k, v) in headers { map.insert(*k, HeaderValue::from_static(v)); }
        WebhookRequest { path: "/api/v1/webhooks/payments".into(), headers: map, body: Bytes::from(body.to_string()) }
    }

    #[test]
    fn test_gateway_code_parse() {
        assert_eq!("PayFast".parse::<GatewayCode>().unwrap(), GatewayCode::PayFast);
        assert_eq!(" ikhokha ".parse::<GatewayCode>().unwrap(), GatewayCode::IKhokha);
        assert!(matches!("paypal".parse::<GatewayCode>(), Err(PaymentError::UnknownGateway(_))));
    }

    #[test]
    fn test_detect_gateway_by_shape() {
        assert_eq!(detect_gateway(&webhook(&[], "m_payment_id=1&pf_payment_id=99&payment_status=COMPLETE")), Some(GatewayCode::PayFast));
        assert_eq!(detect_gateway(&webhook(&[("stripe-signature", "t=1,v1=ab")], "{}")), Some(GatewayCode::Stripe));
        assert_eq!(detect_gateway(&webhook(&[("webhook-signature", "v1,abc")], r#"{"type":"payment.succeeded"}"#)), Some(GatewayCode::Yoco));
        assert_eq!(detect_gateway(&webhook(&[], r#"{"paylinkID":"p1","status":"SUCCESS"}"#)), Some(GatewayCode::IKhokha));
        assert_eq!(detect_gateway(&webhook(&[], r#"{"merchantTransactionId":"o1","result":{"code":"000.000.000"}}"#)), Some(GatewayCode::Peach));
        assert_eq!(detect_gateway(&webhook(&[], "merchantTransactionId=o1&result.code=000.000.000")), Some(GatewayCode::Peach));
        assert_eq!(detect_gateway(&webhook(&[], r#"{"type":"payment.succeeded"}"#)), None);
    }

    #[test]
    fn test_validate_credentials_lists_missing_fields() {
        let err = validate_credentials(GatewayCode::Peach, &serde_json::json!({"entity_id": "e", "access_token": " "})).unwrap_err();
        assert_eq!(err.to_string(), "invalid peach credentials: missing access_token, secret_token");
        assert!(validate_credentials(GatewayCode::PayFast, &serde_json::json!({"merchant_id": "1", "merchant_key": "k"})).is_ok());
    }

    #[test]
    fn test_built_gateway_reports_its_code() {
        let config = TenantGateway {
            tenant_id: Uuid::now_v7(),
            gateway_code: String::new(),
            is_active: true,
            is_test_mode: true,
            credentials: serde_json::json!({
                "merchant_id": "10000100", "merchant_key": "46f0cd694581a",
                "secret_key": "sk_test_1", "webhook_secret": "whsec_a2V5",
                "app_id": "IK1", "app_secret": "ik-secret",
                "entity_id": "8ac7", "access_token": "tok", "secret_token": "sec",
            }),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        for code in GatewayCode::ALL {
            let gateway = build_gateway(code, &config, reqwest::Client::new(), &GatewayEndpoints::default()).unwrap();
            assert_eq!(gateway.code(), code);
        }
    }

    #[test]
    fn test_params_flatten_json() {
        let params = webhook(&[], r#"{"a":{"b":"x","n":2},"c":null}"#).params();
        assert_eq!(params.get("a.b").map(String::as_str), Some("x"));
        assert_eq!(params.get("a.n").map(String::as_str), Some("2"));
        assert_eq!(params.get("c").map(String::as_str), Some(""));
    }
}
