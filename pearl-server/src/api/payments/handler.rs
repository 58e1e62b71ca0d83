//! Payment API Handlers
//!
//! The webhook endpoint ALWAYS returns the provider's acknowledgement
//! shape, whatever happens internally. A business-logic rejection the
//! provider cannot act on must not look like a delivery failure, or it
//! will retry-storm the same event forever; rejections are logged for
//! operators instead. Signature failures are discarded without hinting
//! at which check failed.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::orders::PaymentStatusView;
use crate::payment::signature;
use crate::utils::AppResult;
use shared::models::{ProviderAck, WebhookPayload};

/// The fields of the webhook `data` object this service interprets.
/// Parsed only after the signature over the raw object verified.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
    order_code: i64,
    amount: i64,
}

/// POST /api/payments/webhook - 支付网关回调
pub async fn webhook(
    State(state): State<ServerState>,
    Json(payload): Json<WebhookPayload>,
) -> Json<ProviderAck> {
    if !signature::verify_webhook(
        &state.config.gateway.checksum_key,
        &payload.data,
        &payload.signature,
    ) {
        tracing::warn!(
            target: "security",
            "Webhook signature verification failed, event discarded"
        );
        return Json(ProviderAck::ok());
    }

    let data: WebhookData = match serde_json::from_value(payload.data.clone()) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook data missing required fields, event discarded");
            return Json(ProviderAck::ok());
        }
    };

    match state.orders.confirm_payment(data.order_code, data.amount).await {
        Ok(order) => {
            tracing::info!(
                order_id = %order.id,
                provider_order_code = data.order_code,
                "Webhook processed"
            );
        }
        Err(e) => {
            // Amount mismatches, unknown codes, lost races — operator-only
            tracing::warn!(
                provider_order_code = data.order_code,
                error = %e,
                "Webhook rejected internally"
            );
        }
    }

    Json(ProviderAck::ok())
}

/// GET /api/payments/:order_id/status - 支付状态查询
///
/// 返回本地订单状态加上尽力获取的网关侧状态；网关不可用时退化为
/// 仅本地状态。
pub async fn status(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<PaymentStatusView>> {
    let view = state.orders.payment_status(&order_id).await?;
    Ok(Json(view))
}
