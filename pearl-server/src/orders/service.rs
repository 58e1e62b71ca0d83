//! OrderService - Order lifecycle orchestration
//!
//! Single entry point for every order mutation. Request handlers, the
//! payment webhook and the scheduler sweeps all call the same methods,
//! so one set of invariants covers all of them:
//!
//! - no oversold stock (ledger reservation is all-or-nothing)
//! - no double-confirmed payment (guarded AWAITING_PAYMENT → CONFIRMED)
//! - no lost stock on cancellation (release is flag-gated, idempotent)
//! - per-order history follows transaction commit order
//!
//! # Checkout Flow
//!
//! ```text
//! checkout(req)
//!     ├─ 1. Validate input (items, address)
//!     ├─ 2. Reserve stock (atomic, all-or-nothing)
//!     ├─ 3. Snapshot items + amounts + address
//!     ├─ 4. Create payment link (bank transfer only; failure ⇒ compensate + abort)
//!     ├─ 5. Persist order + history atomically
//!     ├─ 6. Auto-assign staff (best-effort, never fails checkout)
//!     └─ 7. Publish "created" event, return order (+ link)
//! ```

use serde::Serialize;
use shared::models::{
    Actor, ActorRole, CheckoutRequest, CheckoutResponse, HistoryEntry, InventoryFlags, Order,
    OrderAmounts, OrderItem, OrderStatus, PaymentMethod, ProviderPaymentStatus,
    UpdateItemVariantRequest,
};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::{shipping, status};
use crate::assignment::Balancer;
use crate::db::repository::{inventory as inventory_repo, order as order_repo};
use crate::events::LifecyclePublisher;
use crate::inventory::{Ledger, StockLine};
use crate::payment::PaymentPort;
use crate::utils::{AppError, AppResult};

pub use crate::db::repository::order::OrderListFilter;

const RESOURCE: &str = "order";

/// Best-available payment info for the status-check endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    /// Provider-reported state; None when the provider was unreachable
    /// (DB-only fallback) or the order has no payment link.
    pub provider: Option<ProviderPaymentStatus>,
}

#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
    ledger: Ledger,
    balancer: Balancer,
    gateway: Arc<dyn PaymentPort>,
    hub: Arc<dyn LifecyclePublisher>,
}

impl OrderService {
    pub fn new(
        pool: SqlitePool,
        gateway: Arc<dyn PaymentPort>,
        hub: Arc<dyn LifecyclePublisher>,
        tz: chrono_tz::Tz,
    ) -> Self {
        let ledger = Ledger::new(pool.clone());
        let balancer = Balancer::new(pool.clone(), tz);
        Self {
            pool,
            ledger,
            balancer,
            gateway,
            hub,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, order_id: &str) -> AppResult<Order> {
        order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", order_id)))
    }

    pub async fn list(&self, filter: &OrderListFilter) -> AppResult<Vec<Order>> {
        Ok(order_repo::list(&self.pool, filter).await?)
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    pub async fn checkout(&self, req: CheckoutRequest) -> AppResult<CheckoutResponse> {
        // 1. Validate
        if req.items.is_empty() {
            return Err(AppError::validation("no items selected"));
        }
        let address = req
            .address
            .ok_or_else(|| AppError::validation("shipping address is required"))?;
        for item in &req.items {
            if item.quantity <= 0 {
                return Err(AppError::validation(format!(
                    "quantity for {} must be positive",
                    item.sku
                )));
            }
            if item.price < 0 {
                return Err(AppError::validation(format!(
                    "price for {} must not be negative",
                    item.sku
                )));
            }
        }
        if req.discount < 0 {
            return Err(AppError::validation("discount must not be negative"));
        }

        // 2. Reserve stock — aborts the whole checkout on the first
        // failing SKU, leaving the ledger untouched
        let lines: Vec<StockLine> = req.items.iter().map(StockLine::from).collect();
        self.ledger.reserve(&lines).await?;

        // 3. Snapshot items and amounts
        let order_id = snowflake_id().to_string();
        let now = now_millis();
        let items: Vec<OrderItem> = req
            .items
            .iter()
            .map(|i| OrderItem {
                product_id: i.product_id.clone(),
                sku: i.sku.clone(),
                name: i.name.clone(),
                image: i.image.clone(),
                color: i.color.clone(),
                size: i.size.clone(),
                unit_price: i.price,
                quantity: i.quantity,
                line_total: i.price * i.quantity,
            })
            .collect();
        let subtotal: i64 = items.iter().map(|i| i.line_total).sum();
        let fee = shipping::shipping_fee(&address.city, &address.district, subtotal);
        let amounts = OrderAmounts::compute(subtotal, req.discount, fee);

        let initial_status = match req.payment_method {
            PaymentMethod::CashOnDelivery => OrderStatus::Pending,
            PaymentMethod::BankTransfer => OrderStatus::AwaitingPayment,
        };

        // 4. Payment link for non-cash orders. A timeout or rejection
        // here means the order is NOT created: give the stock back and
        // surface the failure to the customer.
        let mut payment = None;
        let mut payment_order_code = None;
        if req.payment_method == PaymentMethod::BankTransfer {
            let code = snowflake_id();
            let description = format!("Don hang {order_id}");
            match self
                .gateway
                .create_payment_link(code, amounts.grand_total, &description)
                .await
            {
                Ok(link) => {
                    payment_order_code = Some(code);
                    payment = Some(link);
                }
                Err(e) => {
                    if let Err(comp_err) = self.ledger.compensate(&lines).await {
                        tracing::error!(
                            order_id = %order_id,
                            error = %comp_err,
                            "Failed to compensate reservation after payment-link failure"
                        );
                    }
                    return Err(e);
                }
            }
        }

        // 5. Persist order + items + initial history atomically
        let order = Order {
            id: order_id.clone(),
            user_id: req.user_id.clone(),
            items,
            amounts,
            shipping_address: address,
            payment_method: req.payment_method,
            status: initial_status,
            assigned_staff_id: None,
            inventory: InventoryFlags {
                reserved: true,
                reserved_at: Some(now),
                released: false,
                released_at: None,
            },
            payment_order_code,
            printed_at: None,
            created_at: now,
            updated_at: now,
            history: vec![HistoryEntry {
                at: now,
                by_user_id: Some(req.user_id.clone()),
                action: "CREATED".to_string(),
                from_status: None,
                to_status: Some(initial_status),
                note: Actor::customer(req.user_id).format_note(Some("order placed")),
            }],
        };
        order_repo::create(&self.pool, &order).await?;
        tracing::info!(
            order_id = %order_id,
            status = %initial_status,
            grand_total = amounts.grand_total,
            "Order created"
        );

        // 6. Best-effort staff assignment — failures are logged, never
        // surfaced to the customer
        if let Err(e) = self.balancer.auto_assign(&order_id).await {
            tracing::warn!(order_id = %order_id, error = %e, "Auto-assignment failed");
        }

        // 7. Publish + return
        let order = self.get(&order_id).await?;
        self.hub.publish(
            RESOURCE,
            "created",
            &order_id,
            serde_json::to_value(&order).ok(),
        );
        Ok(CheckoutResponse { order, payment })
    }

    // ========================================================================
    // Status Transitions
    // ========================================================================

    /// Move an order along one allowed edge.
    ///
    /// The status update is guarded by the loaded status: the loser of a
    /// concurrent transition race observes a stale-state error and must
    /// re-read. Cancellation/return releases reserved stock in the same
    /// transaction, gated by the released flag so it happens exactly
    /// once per order.
    pub async fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        actor: &Actor,
        reason: Option<&str>,
    ) -> AppResult<Order> {
        let order = self.get(order_id).await?;
        let from = order.status;

        if !status::can_transition(from, to) {
            return Err(AppError::InvalidTransition { from, to });
        }
        if actor.role == ActorRole::Customer
            && to == OrderStatus::Cancelled
            && !status::customer_can_cancel(from)
        {
            return Err(AppError::wrong_state(
                "customers may only cancel before the order is confirmed",
            ));
        }

        // Best-effort remote link cancellation for unpaid orders. Runs
        // before the local transaction (no lock across network I/O);
        // failure is advisory — the link points at an order that is
        // about to be cancelled either way.
        if to == OrderStatus::Cancelled
            && from == OrderStatus::AwaitingPayment
            && let Some(code) = order.payment_order_code
            && let Err(e) = self
                .gateway
                .cancel_payment_link(code, "order cancelled")
                .await
        {
            tracing::warn!(
                order_id = %order_id,
                provider_order_code = code,
                error = %e,
                "Remote payment link cancellation failed, continuing with local cancel"
            );
        }

        let mut tx = self.pool.begin().await?;
        let moved = order_repo::update_status_guarded(&mut tx, order_id, from, to).await?;
        if !moved {
            tx.rollback().await?;
            return Err(AppError::wrong_state(format!(
                "order {} is no longer {}, re-read and retry",
                order_id, from
            )));
        }

        if matches!(to, OrderStatus::Cancelled | OrderStatus::Returned) {
            let first_release = order_repo::mark_released_guarded(&mut tx, order_id).await?;
            if first_release {
                order_repo::restock_items(&mut tx, &order.items).await?;
            }
        }

        let entry = HistoryEntry {
            at: now_millis(),
            by_user_id: actor.id.clone(),
            action: "STATUS_CHANGED".to_string(),
            from_status: Some(from),
            to_status: Some(to),
            note: actor.format_note(reason),
        };
        order_repo::append_history(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, from = %from, to = %to, "Order status changed");
        self.hub.publish(RESOURCE, "status_changed", order_id, None);
        self.get(order_id).await
    }

    // ========================================================================
    // Staff Assignment
    // ========================================================================

    /// Match-and-set claim: succeeds only while the order is unassigned
    /// and still pending. Two racing staff members cannot both win.
    pub async fn claim(&self, order_id: &str, staff_id: &str) -> AppResult<Order> {
        let mut tx = self.pool.begin().await?;
        let claimed = order_repo::claim_guarded(&mut tx, order_id, staff_id).await?;
        if !claimed {
            tx.rollback().await?;
            // Distinguish the failure for the caller
            let order = self.get(order_id).await?;
            if let Some(owner) = order.assigned_staff_id {
                return Err(AppError::AlreadyAssigned(format!(
                    "order {} is already assigned to {}",
                    order_id, owner
                )));
            }
            return Err(AppError::wrong_state(format!(
                "order {} is {} and can no longer be claimed",
                order_id, order.status
            )));
        }
        let entry = HistoryEntry {
            at: now_millis(),
            by_user_id: Some(staff_id.to_string()),
            action: "CLAIMED".to_string(),
            from_status: None,
            to_status: None,
            note: None,
        };
        order_repo::append_history(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        self.hub.publish(RESOURCE, "assigned", order_id, None);
        self.get(order_id).await
    }

    /// Explicit (re)assignment by staff, allowed until a terminal status.
    pub async fn assign(
        &self,
        order_id: &str,
        staff_id: &str,
        assigned_by: Option<&str>,
    ) -> AppResult<Order> {
        let mut tx = self.pool.begin().await?;
        let assigned = order_repo::assign_guarded(&mut tx, order_id, staff_id).await?;
        if !assigned {
            tx.rollback().await?;
            let order = self.get(order_id).await?;
            return Err(AppError::wrong_state(format!(
                "order {} is {} and can no longer be assigned",
                order_id, order.status
            )));
        }
        let entry = HistoryEntry {
            at: now_millis(),
            by_user_id: assigned_by.map(str::to_string),
            action: "ASSIGNED".to_string(),
            from_status: None,
            to_status: None,
            note: Some(format!("[staff] assigned to {staff_id}")),
        };
        order_repo::append_history(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        self.hub.publish(RESOURCE, "assigned", order_id, None);
        self.get(order_id).await
    }

    /// Stamp the pick ticket as printed. Idempotent: a second call finds
    /// the stamp already set and returns the order unchanged.
    pub async fn mark_printed(&self, order_id: &str, staff_id: &str) -> AppResult<Order> {
        let mut tx = self.pool.begin().await?;
        let stamped = order_repo::mark_printed_guarded(&mut tx, order_id).await?;
        if !stamped {
            tx.rollback().await?;
            let order = self.get(order_id).await?;
            if order.printed_at.is_some() {
                return Ok(order); // already printed — no-op
            }
            return Err(AppError::wrong_state(format!(
                "order {} is {} and has no pick ticket to print",
                order_id, order.status
            )));
        }
        let entry = HistoryEntry {
            at: now_millis(),
            by_user_id: Some(staff_id.to_string()),
            action: "PRINTED".to_string(),
            from_status: None,
            to_status: None,
            note: None,
        };
        order_repo::append_history(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        self.hub.publish(RESOURCE, "printed", order_id, None);
        self.get(order_id).await
    }

    // ========================================================================
    // Item Variant Edit
    // ========================================================================

    /// Swap one line to a different variant of the same product,
    /// permitted only while the order is still PENDING. The ledger
    /// reservation moves with the line (conditionally take the new SKU,
    /// give back the old) and amounts are recomputed.
    pub async fn update_item_variant(
        &self,
        order_id: &str,
        item_idx: usize,
        req: &UpdateItemVariantRequest,
    ) -> AppResult<Order> {
        let order = self.get(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::wrong_state(format!(
                "variant edits are only allowed while pending, order {} is {}",
                order_id, order.status
            )));
        }
        let item = order.items.get(item_idx).ok_or_else(|| {
            AppError::not_found(format!("order {} has no item {}", order_id, item_idx))
        })?;

        let variant = match (&req.sku, &req.color, &req.size) {
            (Some(sku), _, _) => {
                inventory_repo::find_variant(&self.pool, &item.product_id, sku).await?
            }
            (None, Some(color), Some(size)) => {
                inventory_repo::find_variant_by_color_size(&self.pool, &item.product_id, color, size)
                    .await?
            }
            _ => {
                return Err(AppError::validation(
                    "either sku or both color and size are required",
                ));
            }
        }
        .ok_or_else(|| AppError::not_found("requested variant does not exist"))?;

        if variant.sku == item.sku {
            return Err(AppError::validation("item already uses that variant"));
        }

        let mut tx = self.pool.begin().await?;

        // Move the reservation: new SKU must have stock, old SKU gets it back
        let taken =
            inventory_repo::try_decrement(&mut tx, &item.product_id, &variant.sku, item.quantity)
                .await?;
        if !taken {
            tx.rollback().await?;
            return Err(AppError::OutOfStock {
                sku: variant.sku.clone(),
            });
        }
        inventory_repo::increment(&mut tx, &item.product_id, &item.sku, item.quantity).await?;

        let line_total = variant.price * item.quantity;
        order_repo::update_item_variant(
            &mut tx,
            order_id,
            item_idx as i64,
            &variant.sku,
            &variant.color,
            &variant.size,
            variant.price,
            line_total,
        )
        .await?;

        // Recompute amounts with the new line; guard on PENDING so a
        // concurrent transition aborts the edit
        let subtotal = order.amounts.subtotal - item.line_total + line_total;
        let fee = shipping::shipping_fee(
            &order.shipping_address.city,
            &order.shipping_address.district,
            subtotal,
        );
        let amounts = OrderAmounts::compute(subtotal, order.amounts.discount, fee);
        let updated = order_repo::update_amounts_guarded(&mut tx, order_id, &amounts).await?;
        if !updated {
            tx.rollback().await?;
            return Err(AppError::wrong_state(format!(
                "order {} changed concurrently during variant edit",
                order_id
            )));
        }

        let actor = match &req.actor_id {
            Some(id) => Actor::staff(id.clone()),
            None => Actor::system(),
        };
        let entry = HistoryEntry {
            at: now_millis(),
            by_user_id: actor.id.clone(),
            action: "ITEM_VARIANT_CHANGED".to_string(),
            from_status: None,
            to_status: None,
            note: actor.format_note(Some(&format!(
                "item {}: {} -> {}",
                item_idx, item.sku, variant.sku
            ))),
        };
        order_repo::append_history(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        self.hub.publish(RESOURCE, "updated", order_id, None);
        self.get(order_id).await
    }

    // ========================================================================
    // Payment Reconciliation
    // ========================================================================

    /// The one idempotent entry point for confirmed payments. Both the
    /// webhook and the poll fallback land here.
    ///
    /// - unknown provider code → NotFound
    /// - amount ≠ grand total → AmountMismatch, order untouched (logged
    ///   as a fraud signal — tampered or stale-replay webhook)
    /// - already CONFIRMED (or further along) → silent no-op
    pub async fn confirm_payment(&self, provider_order_code: i64, amount: i64) -> AppResult<Order> {
        let order = order_repo::find_by_payment_code(&self.pool, provider_order_code)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "no order for provider code {}",
                    provider_order_code
                ))
            })?;

        if amount != order.amounts.grand_total {
            tracing::warn!(
                target: "security",
                order_id = %order.id,
                provider_order_code,
                expected = order.amounts.grand_total,
                got = amount,
                "Payment amount mismatch — possible tampering or stale replay"
            );
            return Err(AppError::AmountMismatch {
                expected: order.amounts.grand_total,
                got: amount,
            });
        }

        if order.status != OrderStatus::AwaitingPayment {
            // Duplicate webhook delivery or poll racing the webhook
            tracing::debug!(
                order_id = %order.id,
                status = %order.status,
                "Payment already reconciled, ignoring duplicate confirmation"
            );
            return Ok(order);
        }

        self.transition(
            &order.id,
            OrderStatus::Confirmed,
            &Actor::system(),
            Some("payment confirmed by provider"),
        )
        .await
    }

    /// Status-check endpoint backing: local state plus best-available
    /// provider info. A PAID poll result routes through
    /// [`Self::confirm_payment`] — never a separate code path.
    pub async fn payment_status(&self, order_id: &str) -> AppResult<PaymentStatusView> {
        let order = self.get(order_id).await?;

        let provider = match order.payment_order_code {
            Some(code) => match self.gateway.poll_status(code).await {
                Ok(remote) => {
                    if remote.status == "PAID"
                        && let Err(e) = self.confirm_payment(code, remote.amount_paid).await
                    {
                        // Reconciliation failures are operator-only noise
                        tracing::warn!(
                            order_id = %order_id,
                            error = %e,
                            "Poll-driven payment confirmation rejected"
                        );
                    }
                    Some(remote)
                }
                Err(e) => {
                    tracing::debug!(
                        order_id = %order_id,
                        error = %e,
                        "Provider poll failed, falling back to local state"
                    );
                    None
                }
            },
            None => None,
        };

        // Re-read: the poll may have confirmed the order
        let order = self.get(order_id).await?;
        Ok(PaymentStatusView {
            order_id: order.id,
            status: order.status,
            payment_method: order.payment_method,
            provider,
        })
    }
}
