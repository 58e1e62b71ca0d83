//! Hosted-checkout gateway integration via REST API (no SDK dependency)
//!
//! Every call carries a bounded timeout: a hung provider must fail the
//! caller, not wedge a checkout or a scheduler sweep. Creating a link
//! never mutates order state — status only changes on confirmed payment.

use serde::{Deserialize, Serialize};
use shared::models::{PaymentLink, ProviderPaymentStatus};
use std::time::Duration;

use super::{PaymentPort, signature};
use crate::utils::{AppError, AppResult};

/// Gateway connection settings, loaded from the environment by
/// `core::Config`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub client_id: String,
    pub api_key: String,
    /// Shared secret for request signing and webhook verification
    pub checksum_key: String,
    pub return_url: String,
    pub cancel_url: String,
    pub timeout_ms: u64,
}

pub struct Gateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkRequest<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    signature: String,
}

#[derive(Deserialize)]
struct ProviderEnvelope<T> {
    code: String,
    desc: String,
    data: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkData {
    checkout_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentStatusData {
    status: String,
    #[serde(default)]
    amount_paid: i64,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Settings accessor for the webhook boundary.
    pub fn checksum_key(&self) -> &str {
        &self.config.checksum_key
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl PaymentPort for Gateway {
    async fn create_payment_link(
        &self,
        order_code: i64,
        amount: i64,
        description: &str,
    ) -> AppResult<PaymentLink> {
        // Signature over the canonical field set, alphabetical by key
        let payload = format!(
            "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
            amount, self.config.cancel_url, description, order_code, self.config.return_url
        );
        let body = CreateLinkRequest {
            order_code,
            amount,
            description,
            return_url: &self.config.return_url,
            cancel_url: &self.config.cancel_url,
            signature: signature::sign(&self.config.checksum_key, &payload),
        };

        let resp: ProviderEnvelope<CreateLinkData> = self
            .client
            .post(self.endpoint("/v2/payment-requests"))
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::payment_provider(format!("create link request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::payment_provider(format!("create link bad response: {e}")))?;

        if resp.code != "00" {
            return Err(AppError::payment_provider(format!(
                "create link rejected: {} ({})",
                resp.desc, resp.code
            )));
        }
        let data = resp
            .data
            .ok_or_else(|| AppError::payment_provider("create link response missing data"))?;

        Ok(PaymentLink {
            provider_order_code: order_code,
            checkout_url: data.checkout_url,
        })
    }

    async fn cancel_payment_link(&self, order_code: i64, reason: &str) -> AppResult<()> {
        let resp: ProviderEnvelope<serde_json::Value> = self
            .client
            .post(self.endpoint(&format!("/v2/payment-requests/{order_code}/cancel")))
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .json(&serde_json::json!({ "cancellationReason": reason }))
            .send()
            .await
            .map_err(|e| AppError::payment_provider(format!("cancel link request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::payment_provider(format!("cancel link bad response: {e}")))?;

        if resp.code != "00" {
            return Err(AppError::payment_provider(format!(
                "cancel link rejected: {} ({})",
                resp.desc, resp.code
            )));
        }
        Ok(())
    }

    async fn poll_status(&self, order_code: i64) -> AppResult<ProviderPaymentStatus> {
        let resp: ProviderEnvelope<PaymentStatusData> = self
            .client
            .get(self.endpoint(&format!("/v2/payment-requests/{order_code}")))
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| AppError::payment_provider(format!("status poll failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::payment_provider(format!("status poll bad response: {e}")))?;

        if resp.code != "00" {
            return Err(AppError::payment_provider(format!(
                "status poll rejected: {} ({})",
                resp.desc, resp.code
            )));
        }
        let data = resp
            .data
            .ok_or_else(|| AppError::payment_provider("status poll response missing data"))?;

        Ok(ProviderPaymentStatus {
            status: data.status,
            amount_paid: data.amount_paid,
        })
    }
}
