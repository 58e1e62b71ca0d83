//! Order Model (订单聚合)
//!
//! The order is the root aggregate of the lifecycle subsystem. Item and
//! address fields are snapshots taken at checkout time and are never
//! re-derived from the live catalog, so later catalog edits cannot
//! retroactively alter a placed order.
//!
//! All money amounts are integral VND (`i64`), all timestamps Unix millis.

use serde::{Deserialize, Serialize};

/// Order status — single source of truth for where the order is in its
/// lifecycle. Terminal statuses are `Done`, `Cancelled` and `Returned`;
/// `Returned` is reachable only from `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderStatus {
    Pending,
    AwaitingPayment,
    Confirmed,
    Packing,
    Shipping,
    Delivering,
    Done,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Statuses from which no further business transition is permitted
    /// (except the documented DONE → RETURNED edge).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Returned)
    }

    /// Stable string form, matching the persisted TEXT column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::AwaitingPayment => "AWAITING_PAYMENT",
            Self::Confirmed => "CONFIRMED",
            Self::Packing => "PACKING",
            Self::Shipping => "SHIPPING",
            Self::Delivering => "DELIVERING",
            Self::Done => "DONE",
            Self::Cancelled => "CANCELLED",
            Self::Returned => "RETURNED",
        }
    }

    /// Non-terminal statuses, used for open-order counting.
    pub fn open_statuses() -> &'static [OrderStatus] {
        &[
            Self::Pending,
            Self::AwaitingPayment,
            Self::Confirmed,
            Self::Packing,
            Self::Shipping,
            Self::Delivering,
        ]
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method chosen at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PaymentMethod {
    CashOnDelivery,
    BankTransfer,
}

/// One order line — immutable snapshot of the purchased variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub product_id: String,
    /// Variant SKU (color/size combination)
    pub sku: String,
    pub name: String,
    pub image: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Unit price in VND at checkout time
    pub unit_price: i64,
    pub quantity: i64,
    /// `unit_price * quantity`
    pub line_total: i64,
}

/// Order money summary
///
/// Invariant: `grand_total = max(subtotal - discount, 0) + shipping_fee`.
/// Recomputed through [`OrderAmounts::compute`] whenever items change so
/// the formula is never evaluated twice inconsistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmounts {
    pub subtotal: i64,
    pub discount: i64,
    pub shipping_fee: i64,
    pub grand_total: i64,
}

impl OrderAmounts {
    pub fn compute(subtotal: i64, discount: i64, shipping_fee: i64) -> Self {
        Self {
            subtotal,
            discount,
            shipping_fee,
            grand_total: (subtotal - discount).max(0) + shipping_fee,
        }
    }
}

/// Recipient address snapshot taken at checkout time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub ward: String,
    pub district: String,
    pub city: String,
}

/// Tracks whether stock has been taken from the ledger and whether it
/// has been given back. `released` gates the release path so releasing
/// twice for the same order is a no-op the second time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InventoryFlags {
    pub reserved: bool,
    pub reserved_at: Option<i64>,
    pub released: bool,
    pub released_at: Option<i64>,
}

/// Append-only history entry. Every state transition and assignment
/// event is recorded exactly once; entries are never mutated or pruned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct HistoryEntry {
    pub at: i64,
    pub by_user_id: Option<String>,
    pub action: String,
    pub from_status: Option<OrderStatus>,
    pub to_status: Option<OrderStatus>,
    pub note: Option<String>,
}

/// Order aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Snowflake id rendered as string
    pub id: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub amounts: OrderAmounts,
    pub shipping_address: AddressSnapshot,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    /// Set by claim or auto-assignment, mutable until a terminal status
    pub assigned_staff_id: Option<String>,
    pub inventory: InventoryFlags,
    /// External reference used to reconcile gateway webhooks/polls
    pub payment_order_code: Option<i64>,
    /// When a staff member printed the pick ticket (None = untouched)
    pub printed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub history: Vec<HistoryEntry>,
}

// ============================================================================
// Actor
// ============================================================================

/// Who performed a mutation. The role is only used to prefix history
/// notes at the boundary; it carries no state-machine meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Customer,
    #[default]
    Staff,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<String>,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: ActorRole::Customer,
        }
    }

    pub fn staff(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: ActorRole::Staff,
        }
    }

    pub fn system() -> Self {
        Self {
            id: None,
            role: ActorRole::System,
        }
    }

    /// Role-prefixed history note, e.g. `[staff] wrong size ordered`.
    pub fn format_note(&self, note: Option<&str>) -> Option<String> {
        note.map(|n| format!("[{}] {}", self.role.as_str(), n))
    }
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// One resolved cart line handed over by the (out-of-scope) cart service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub image: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Unit price in VND as resolved by the cart
    pub price: i64,
    pub quantity: i64,
}

/// Checkout payload. The address snapshot and the discount come from the
/// out-of-scope address and promotion collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub address: Option<AddressSnapshot>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount: i64,
    pub items: Vec<CheckoutItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: Order,
    /// Hosted payment link, present for bank-transfer orders only
    pub payment: Option<super::payment::PaymentLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub staff_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    /// Staff member the order is (re)assigned to
    pub staff_id: String,
    /// Staff member performing the assignment
    pub assigned_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub to_status: OrderStatus,
    pub reason: Option<String>,
    pub actor_id: Option<String>,
    #[serde(default)]
    pub actor_role: ActorRole,
}

/// Variant edit: either an explicit SKU or a (color, size) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemVariantRequest {
    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub actor_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grand_total_never_negative() {
        let a = OrderAmounts::compute(100_000, 150_000, 30_000);
        assert_eq!(a.grand_total, 30_000);
    }

    #[test]
    fn grand_total_formula() {
        let a = OrderAmounts::compute(250_000, 50_000, 25_000);
        assert_eq!(a.grand_total, 225_000);
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Done.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Returned.is_terminal());
        assert!(!OrderStatus::Delivering.is_terminal());
        assert_eq!(OrderStatus::open_statuses().len(), 6);
    }

    #[test]
    fn actor_note_prefix() {
        let note = Actor::system().format_note(Some("unpaid for over 24h"));
        assert_eq!(note.as_deref(), Some("[system] unpaid for over 24h"));
        assert_eq!(Actor::staff("st-1").format_note(None), None);
    }

    #[test]
    fn status_serde_screaming_snake() {
        let s = serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap();
        assert_eq!(s, "\"AWAITING_PAYMENT\"");
        let st: OrderStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(st, OrderStatus::Cancelled);
    }
}
