//! 订单清扫调度器
//!
//! 固定间隔运行两类清扫，与请求处理互不感知：
//!
//! - **超时未付**: `AWAITING_PAYMENT` 超过付款时限的订单 → 尽力取消
//!   远端支付链接、幂等回补库存、转为 `CANCELLED`。
//! - **滞留未打印**: `PENDING` 超过确认时限且从未打印拣货单的订单 →
//!   批量转为 `CONFIRMED`（不动库存与支付）。
//!
//! 两类清扫都是可重入的：候选查询和每次状态写入都以当前状态为条件，
//! 上一轮未结束就触发下一轮、或多实例并行清扫时，重复处理都是无害的
//! （第二个执行者匹配不到任何行）。

use shared::models::{Actor, OrderStatus};
use shared::util::now_millis;
use tokio_util::sync::CancellationToken;

use crate::db::repository::order as order_repo;
use crate::orders::OrderService;
use crate::utils::{AppError, AppResult};

/// 调度器时限配置
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// 清扫间隔（秒）
    pub interval_secs: u64,
    /// 未付订单过期时限（小时）
    pub unpaid_expiry_hours: i64,
    /// 未打印 PENDING 订单自动确认时限（小时）
    pub pending_confirm_hours: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            unpaid_expiry_hours: 24,
            pending_confirm_hours: 12,
        }
    }
}

/// 订单清扫调度器
///
/// 注册为 `TaskKind::Periodic`，在 `start_background_tasks()` 中启动。
/// 所有状态变更走 [`OrderService`] 的转换原语，与请求路径共享同一套
/// 不变量。
pub struct OrderScheduler {
    service: OrderService,
    config: SweepConfig,
    shutdown: CancellationToken,
}

impl OrderScheduler {
    pub fn new(service: OrderService, config: SweepConfig, shutdown: CancellationToken) -> Self {
        Self {
            service,
            config,
            shutdown,
        }
    }

    /// 主循环：周期触发两类清扫
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            "Order scheduler started"
        );
        let interval = std::time::Duration::from_secs(self.config.interval_secs);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Order scheduler received shutdown signal");
                    return;
                }
            }
        }
    }

    /// 单次清扫（两类依次执行）
    pub async fn tick(&self) {
        if let Err(e) = self.sweep_expire_unpaid().await {
            tracing::error!("Expire-unpaid sweep failed: {}", e);
        }
        if let Err(e) = self.sweep_confirm_stale().await {
            tracing::error!("Confirm-stale sweep failed: {}", e);
        }
    }

    /// 清扫 A: 取消超时未付订单
    pub async fn sweep_expire_unpaid(&self) -> AppResult<()> {
        let cutoff = now_millis() - self.config.unpaid_expiry_hours * 3_600_000;
        let ids = order_repo::find_ids_in_status_older_than(
            self.service.pool(),
            OrderStatus::AwaitingPayment,
            cutoff,
        )
        .await?;

        if ids.is_empty() {
            return Ok(());
        }
        tracing::info!(count = ids.len(), "Expiring unpaid orders");

        let note = format!(
            "auto-cancelled: unpaid for over {}h",
            self.config.unpaid_expiry_hours
        );
        for id in ids {
            // transition() 内部会尽力取消远端链接并幂等回补库存
            match self
                .service
                .transition(&id, OrderStatus::Cancelled, &Actor::system(), Some(&note))
                .await
            {
                Ok(_) => {
                    tracing::info!(order_id = %id, "Unpaid order expired");
                }
                // 状态已被别的执行者改掉 → 本轮跳过即可
                Err(AppError::WrongState(_)) | Err(AppError::InvalidTransition { .. }) => {
                    tracing::debug!(order_id = %id, "Order changed before expiry, skipping");
                }
                Err(e) => {
                    tracing::error!(order_id = %id, error = %e, "Failed to expire unpaid order");
                }
            }
        }
        Ok(())
    }

    /// 清扫 B: 自动确认滞留且未打印的 PENDING 订单
    ///
    /// 打印过拣货单的订单说明已有人在处理，留给人工。
    pub async fn sweep_confirm_stale(&self) -> AppResult<()> {
        let cutoff = now_millis() - self.config.pending_confirm_hours * 3_600_000;
        let ids = order_repo::find_stale_unprinted_ids(self.service.pool(), cutoff).await?;

        if ids.is_empty() {
            return Ok(());
        }
        tracing::info!(count = ids.len(), "Auto-confirming stale pending orders");

        let note = format!(
            "auto-confirmed: pending and unprinted for over {}h",
            self.config.pending_confirm_hours
        );
        for id in ids {
            match self
                .service
                .transition(&id, OrderStatus::Confirmed, &Actor::system(), Some(&note))
                .await
            {
                Ok(_) => {
                    tracing::info!(order_id = %id, "Stale pending order auto-confirmed");
                }
                Err(AppError::WrongState(_)) | Err(AppError::InvalidTransition { .. }) => {
                    tracing::debug!(order_id = %id, "Order changed before auto-confirm, skipping");
                }
                Err(e) => {
                    tracing::error!(order_id = %id, error = %e, "Failed to auto-confirm order");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHub;
    use crate::payment::testing::StubGateway;
    use crate::testutil::{backdate_order, checkout_item, sample_address, seed_variant, test_pool};
    use shared::models::{CheckoutRequest, PaymentMethod};
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn scheduler(pool: &SqlitePool, gateway: Arc<StubGateway>) -> (OrderScheduler, OrderService) {
        let service = OrderService::new(
            pool.clone(),
            gateway,
            Arc::new(EventHub::new()),
            chrono_tz::Asia::Ho_Chi_Minh,
        );
        let sched = OrderScheduler::new(
            service.clone(),
            SweepConfig::default(),
            CancellationToken::new(),
        );
        (sched, service)
    }

    async fn place_order(service: &OrderService, method: PaymentMethod) -> String {
        let resp = service
            .checkout(CheckoutRequest {
                user_id: "u-1".to_string(),
                address: Some(sample_address()),
                payment_method: method,
                discount: 0,
                items: vec![checkout_item("p1", "X", 99_000, 1)],
            })
            .await
            .unwrap();
        resp.order.id
    }

    fn hours_ago(hours: i64) -> i64 {
        now_millis() - hours * 3_600_000
    }

    /// Scenario: 25h-old AWAITING_PAYMENT order is cancelled, its stock
    /// released, and the remote link cancel attempted even though the
    /// provider call fails.
    #[tokio::test]
    async fn expires_stale_unpaid_orders_despite_remote_failure() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 5).await;
        let stub = Arc::new(StubGateway::failing_cancel());
        let (sched, service) = scheduler(&pool, stub.clone());

        let id = place_order(&service, PaymentMethod::BankTransfer).await;
        assert_eq!(service.ledger().stock_of("p1", "X").await.unwrap(), Some(4));
        backdate_order(&pool, &id, hours_ago(25)).await;

        sched.sweep_expire_unpaid().await.unwrap();

        let order = service.get(&id).await.unwrap();
        assert_eq!(order.status, shared::models::OrderStatus::Cancelled);
        assert!(order.inventory.released);
        assert_eq!(service.ledger().stock_of("p1", "X").await.unwrap(), Some(5));
        assert_eq!(stub.cancel_calls.load(Ordering::SeqCst), 1);
        assert!(order.history.iter().any(|h| {
            h.action == "STATUS_CHANGED"
                && h.note.as_deref().is_some_and(|n| n.contains("auto-cancelled"))
        }));
    }

    #[tokio::test]
    async fn fresh_unpaid_orders_are_left_alone() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 5).await;
        let (sched, service) = scheduler(&pool, Arc::new(StubGateway::default()));

        let id = place_order(&service, PaymentMethod::BankTransfer).await;
        backdate_order(&pool, &id, hours_ago(23)).await;

        sched.sweep_expire_unpaid().await.unwrap();

        let order = service.get(&id).await.unwrap();
        assert_eq!(order.status, shared::models::OrderStatus::AwaitingPayment);
    }

    /// Property: running the sweep twice cancels each order exactly once
    /// — the second run's status gate matches nothing.
    #[tokio::test]
    async fn expire_sweep_is_safe_to_rerun() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 5).await;
        let (sched, service) = scheduler(&pool, Arc::new(StubGateway::default()));

        let id = place_order(&service, PaymentMethod::BankTransfer).await;
        backdate_order(&pool, &id, hours_ago(25)).await;

        sched.sweep_expire_unpaid().await.unwrap();
        sched.sweep_expire_unpaid().await.unwrap();

        let order = service.get(&id).await.unwrap();
        assert_eq!(order.status, shared::models::OrderStatus::Cancelled);
        // Stock released once, one cancellation history entry
        assert_eq!(service.ledger().stock_of("p1", "X").await.unwrap(), Some(5));
        let cancels = order
            .history
            .iter()
            .filter(|h| h.to_status == Some(shared::models::OrderStatus::Cancelled))
            .count();
        assert_eq!(cancels, 1);
    }

    /// Scenario: 13h-old PENDING order with no printed ticket is
    /// auto-confirmed; the printed one is left for the human handling it.
    #[tokio::test]
    async fn confirms_stale_unprinted_but_not_printed_orders() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 5).await;
        let (sched, service) = scheduler(&pool, Arc::new(StubGateway::default()));

        let forgotten = place_order(&service, PaymentMethod::CashOnDelivery).await;
        let handled = place_order(&service, PaymentMethod::CashOnDelivery).await;
        service.mark_printed(&handled, "st-1").await.unwrap();
        backdate_order(&pool, &forgotten, hours_ago(13)).await;
        backdate_order(&pool, &handled, hours_ago(13)).await;

        sched.sweep_confirm_stale().await.unwrap();

        let forgotten = service.get(&forgotten).await.unwrap();
        assert_eq!(forgotten.status, shared::models::OrderStatus::Confirmed);
        assert!(forgotten.history.iter().any(|h| {
            h.note.as_deref().is_some_and(|n| n.contains("auto-confirmed"))
        }));
        // Auto-confirm never touches inventory (reserved at checkout)
        assert!(!forgotten.inventory.released);
        assert_eq!(service.ledger().stock_of("p1", "X").await.unwrap(), Some(3));

        let handled = service.get(&handled).await.unwrap();
        assert_eq!(handled.status, shared::models::OrderStatus::Pending);
    }

    #[tokio::test]
    async fn tick_runs_both_sweeps() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 5).await;
        let (sched, service) = scheduler(&pool, Arc::new(StubGateway::default()));

        let unpaid = place_order(&service, PaymentMethod::BankTransfer).await;
        let stale = place_order(&service, PaymentMethod::CashOnDelivery).await;
        backdate_order(&pool, &unpaid, hours_ago(25)).await;
        backdate_order(&pool, &stale, hours_ago(13)).await;

        sched.tick().await;

        assert_eq!(
            service.get(&unpaid).await.unwrap().status,
            shared::models::OrderStatus::Cancelled
        );
        assert_eq!(
            service.get(&stale).await.unwrap().status,
            shared::models::OrderStatus::Confirmed
        );
    }
}
