//! iKhokha iK Pay paylinks. Requests and callbacks are signed with
//! HMAC-SHA256 over `path + body` using the application secret.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{hmac_sha256, read_json, verify_hex_hmac, GatewayCode, Notification, PaymentError, PaymentGateway, PaymentRequest, PaymentSession, WebhookRequest};
use crate::domain::PaymentOutcome;

const PAYMENT_PATH: &str = "/public-api/v1/api/payment";

#[derive(Debug, Clone, Deserialize)]
pub struct IKhokhaCredentials {
    pub app_id: String,
    pub app_secret: String,
}

pub struct IKhokhaGateway {
    credentials: IKhokhaCredentials,
    http: reqwest::Client,
    base_url: String,
    test_mode: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaylinkResponse {
    paylink_url: String,
    #[serde(rename = "paylinkID")]
    paylink_id: Option<String>,
}

impl IKhokhaGateway {
    pub fn new(credentials: IKhokhaCredentials, http: reqwest::Client, base_url: String, test_mode: bool) -> Self {
        Self { credentials, http, base_url, test_mode }
    }

    fn sign(&self, path: &str, body: &str) -> Option<String> {
        hmac_sha256(self.credentials.app_secret.trim().as_bytes(), format!("{path}{body}").as_bytes()).map(hex::encode)
    }
}

#[async_trait]
impl PaymentGateway for IKhokhaGateway {
    fn code(&self) -> GatewayCode { GatewayCode::IKhokha }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let body = json!({
            "entityID": self.credentials.app_id,
            "externalEntityID": self.credentials.app_id,
            "amount": req.amount.minor_units(),
            "currency": req.amount.currency(),
            "requesterUrl": req.return_url,
            "mode": if self.test_mode { "test" } else { "live" },
            "description": req.description,
            "externalTransactionID": req.order_id.to_string(),
            "urls": {
                "callbackUrl": req.notify_url,
                "successPageUrl": req.return_url,
                "failurePageUrl": req.cancel_url,
                "cancelUrl": req.cancel_url,
            },
        })
        .to_string();
        // The signature covers the exact bytes sent.
        let signature = self.sign(PAYMENT_PATH, &body)
            .ok_or_else(|| PaymentError::InvalidCredentials(GatewayCode::IKhokha, "app_secret".into()))?;

        let response = self.http
            .post(format!("{}{PAYMENT_PATH}", self.base_url))
            .header("IK-APPID", self.credentials.app_id.trim())
            .header("IK-SIGN", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let paylink: PaylinkResponse = read_json(GatewayCode::IKhokha, response).await?;
        Ok(PaymentSession { gateway: GatewayCode::IKhokha, redirect_url: paylink.paylink_url, reference: paylink.paylink_id })
    }

    fn verify_webhook(&self, webhook: &WebhookRequest) -> Result<(), PaymentError> {
        let received = webhook.header("ik-sign").ok_or(PaymentError::InvalidSignature)?;
        let data = format!("{}{}", webhook.path, webhook.body_str());
        if verify_hex_hmac(self.credentials.app_secret.trim().as_bytes(), data.as_bytes(), received) {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature)
        }
    }
}

pub(super) fn parse_notification(webhook: &WebhookRequest) -> Result<Notification, PaymentError> {
    let malformed = |msg: &str| PaymentError::MalformedWebhook(GatewayCode::IKhokha, msg.to_string());
    let json = webhook.json().ok_or_else(|| malformed("body is not a JSON object"))?;
    let order_reference = json.get("externalTransactionID").and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing externalTransactionID"))?
        .to_string();
    let outcome = match json.get("status").and_then(|v| v.as_str()).map(str::to_ascii_uppercase).as_deref() {
        Some("SUCCESS") => PaymentOutcome::Paid,
        Some("FAILURE") | Some("FAILED") => PaymentOutcome::Failed,
        Some("CANCELLED") => PaymentOutcome::Cancelled,
        _ => PaymentOutcome::Pending,
    };
    let gateway_reference = json.get("paylinkID").and_then(|v| v.as_str()).map(str::to_string);
    Ok(Notification { order_reference, outcome, gateway_reference, payload: json })
}
