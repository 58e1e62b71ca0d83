//! Payment gateway DTOs
//!
//! Wire shapes exchanged with the hosted-checkout provider. The provider
//! is authoritative for payment state; local order state is reconciled
//! through webhooks or polling.

use serde::{Deserialize, Serialize};

/// Result of creating a hosted payment link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    /// Provider-side order code, unique per attempt
    pub provider_order_code: i64,
    pub checkout_url: String,
}

/// Webhook envelope delivered by the provider.
///
/// `data` is kept as raw JSON: the HMAC signature is computed over the
/// canonicalized `data` object, so it must be verified before any field
/// is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub code: String,
    pub desc: String,
    #[serde(default)]
    pub success: bool,
    pub data: serde_json::Value,
    pub signature: String,
}

/// Payment state reported by the provider poll endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPaymentStatus {
    /// PENDING | PAID | CANCELLED | EXPIRED
    pub status: String,
    #[serde(default)]
    pub amount_paid: i64,
}

/// Acknowledgement shape the provider expects from the webhook endpoint.
///
/// Returned unconditionally — business-logic rejections must not look
/// like delivery failures, or the provider will retry-storm events we
/// can never accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAck {
    pub code: String,
    pub desc: String,
}

impl ProviderAck {
    pub fn ok() -> Self {
        Self {
            code: "00".to_string(),
            desc: "success".to_string(),
        }
    }
}
