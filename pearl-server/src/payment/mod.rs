//! Payment Gateway Adapter
//!
//! The provider is authoritative for payment state. Local order state is
//! reconciled either by webhook push or by polling — both MUST route
//! through `OrderService::confirm_payment`, never a second code path, so
//! a webhook racing a poll cannot produce divergent state.

pub mod gateway;
pub mod signature;

pub use gateway::{Gateway, GatewayConfig};

use shared::models::{PaymentLink, ProviderPaymentStatus};

use crate::utils::AppResult;

/// Seam between the lifecycle service and the payment provider.
#[async_trait::async_trait]
pub trait PaymentPort: Send + Sync {
    /// Request a hosted payment link. Does not mutate any order.
    async fn create_payment_link(
        &self,
        order_code: i64,
        amount: i64,
        description: &str,
    ) -> AppResult<PaymentLink>;

    /// Cancel the provider-side link. Advisory: callers treat failures
    /// as logged noise, never as a reason to keep a local order alive.
    async fn cancel_payment_link(&self, order_code: i64, reason: &str) -> AppResult<()>;

    /// Fallback reconciliation when a webhook may have been lost.
    async fn poll_status(&self, order_code: i64) -> AppResult<ProviderPaymentStatus>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::utils::AppError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory gateway double. Link creation echoes the order code;
    /// cancel/poll behavior is configurable per test.
    pub struct StubGateway {
        pub fail_create: bool,
        pub fail_cancel: bool,
        pub cancel_calls: AtomicUsize,
        pub poll_result: Mutex<Option<ProviderPaymentStatus>>,
    }

    impl Default for StubGateway {
        fn default() -> Self {
            Self {
                fail_create: false,
                fail_cancel: false,
                cancel_calls: AtomicUsize::new(0),
                poll_result: Mutex::new(None),
            }
        }
    }

    impl StubGateway {
        pub fn failing_cancel() -> Self {
            Self {
                fail_cancel: true,
                ..Self::default()
            }
        }

        pub fn failing_create() -> Self {
            Self {
                fail_create: true,
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl PaymentPort for StubGateway {
        async fn create_payment_link(
            &self,
            order_code: i64,
            _amount: i64,
            _description: &str,
        ) -> AppResult<PaymentLink> {
            if self.fail_create {
                return Err(AppError::payment_provider("stub: create disabled"));
            }
            Ok(PaymentLink {
                provider_order_code: order_code,
                checkout_url: format!("https://pay.example/checkout/{order_code}"),
            })
        }

        async fn cancel_payment_link(&self, _order_code: i64, _reason: &str) -> AppResult<()> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_cancel {
                return Err(AppError::payment_provider("stub: cancel disabled"));
            }
            Ok(())
        }

        async fn poll_status(&self, _order_code: i64) -> AppResult<ProviderPaymentStatus> {
            self.poll_result
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| AppError::payment_provider("stub: poll disabled"))
        }
    }
}
