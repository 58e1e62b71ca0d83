//! Order Repository
//!
//! The `orders` row carries the status column that every conditional
//! write is keyed on: transitions, claims and the release flag all use
//! `UPDATE ... WHERE <expected current state>` and report whether the
//! guard matched. History rows are inserted in the same transaction as
//! the mutation they record, so per-order history follows commit order.

use super::{RepoResult, inventory};
use shared::models::{
    AddressSnapshot, HistoryEntry, InventoryFlags, Order, OrderAmounts, OrderItem, OrderStatus,
    PaymentMethod,
};
use shared::util::now_millis;
use sqlx::{SqliteConnection, SqlitePool};

const ORDER_COLUMNS: &str = "id, user_id, status, payment_method, subtotal, discount, \
    shipping_fee, grand_total, ship_full_name, ship_phone, ship_line1, ship_ward, \
    ship_district, ship_city, assigned_staff_id, inventory_reserved, inventory_reserved_at, \
    inventory_released, inventory_released_at, payment_order_code, printed_at, \
    created_at, updated_at";

const ITEM_COLUMNS: &str =
    "product_id, sku, name, image, color, size, unit_price, quantity, line_total";

const HISTORY_COLUMNS: &str = "at, by_user_id, action, from_status, to_status, note";

/// Flat row shape; assembled into [`Order`] together with items/history.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    subtotal: i64,
    discount: i64,
    shipping_fee: i64,
    grand_total: i64,
    ship_full_name: String,
    ship_phone: String,
    ship_line1: String,
    ship_ward: String,
    ship_district: String,
    ship_city: String,
    assigned_staff_id: Option<String>,
    inventory_reserved: bool,
    inventory_reserved_at: Option<i64>,
    inventory_released: bool,
    inventory_released_at: Option<i64>,
    payment_order_code: Option<i64>,
    printed_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>, history: Vec<HistoryEntry>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items,
            amounts: OrderAmounts {
                subtotal: self.subtotal,
                discount: self.discount,
                shipping_fee: self.shipping_fee,
                grand_total: self.grand_total,
            },
            shipping_address: AddressSnapshot {
                full_name: self.ship_full_name,
                phone: self.ship_phone,
                line1: self.ship_line1,
                ward: self.ship_ward,
                district: self.ship_district,
                city: self.ship_city,
            },
            payment_method: self.payment_method,
            status: self.status,
            assigned_staff_id: self.assigned_staff_id,
            inventory: InventoryFlags {
                reserved: self.inventory_reserved,
                reserved_at: self.inventory_reserved_at,
                released: self.inventory_released,
                released_at: self.inventory_released_at,
            },
            payment_order_code: self.payment_order_code,
            printed_at: self.printed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            history,
        }
    }
}

/// List filter — exactly the staff console's three views plus the
/// storefront's "my orders".
#[derive(Debug, Default, Clone)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub unassigned: bool,
    pub assignee: Option<String>,
    pub user_id: Option<String>,
    pub limit: i32,
    pub offset: i32,
}

// ============================================================================
// Reads
// ============================================================================

async fn load_items(pool: &SqlitePool, order_id: &str) -> RepoResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY idx"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

async fn load_history(pool: &SqlitePool, order_id: &str) -> RepoResult<Vec<HistoryEntry>> {
    let history = sqlx::query_as::<_, HistoryEntry>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM order_history WHERE order_id = ? ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(history)
}

async fn assemble(pool: &SqlitePool, row: OrderRow) -> RepoResult<Order> {
    let items = load_items(pool, &row.id).await?;
    let history = load_history(pool, &row.id).await?;
    Ok(row.into_order(items, history))
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    match row {
        Some(row) => Ok(Some(assemble(pool, row).await?)),
        None => Ok(None),
    }
}

/// Reconciliation lookup: webhooks and polls identify the order by the
/// provider-side order code.
pub async fn find_by_payment_code(pool: &SqlitePool, code: i64) -> RepoResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_order_code = ?"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    match row {
        Some(row) => Ok(Some(assemble(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn list(pool: &SqlitePool, filter: &OrderListFilter) -> RepoResult<Vec<Order>> {
    let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.unassigned {
        sql.push_str(" AND assigned_staff_id IS NULL");
    }
    if filter.assignee.is_some() {
        sql.push_str(" AND assigned_staff_id = ?");
    }
    if filter.user_id.is_some() {
        sql.push_str(" AND user_id = ?");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

    let mut query = sqlx::query_as::<_, OrderRow>(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(assignee) = &filter.assignee {
        query = query.bind(assignee.clone());
    }
    if let Some(user_id) = &filter.user_id {
        query = query.bind(user_id.clone());
    }
    let limit = if filter.limit > 0 { filter.limit } else { 50 };
    let rows = query.bind(limit).bind(filter.offset).fetch_all(pool).await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(assemble(pool, row).await?);
    }
    Ok(orders)
}

/// Candidates for the expiry sweep. The status is part of the query so a
/// re-run (or a second scheduler instance) matches nothing once an order
/// has moved on.
pub async fn find_ids_in_status_older_than(
    pool: &SqlitePool,
    status: OrderStatus,
    cutoff_millis: i64,
) -> RepoResult<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM orders WHERE status = ? AND created_at < ? ORDER BY created_at",
    )
    .bind(status.as_str())
    .bind(cutoff_millis)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Candidates for the auto-confirm sweep: pending, stale, never printed.
pub async fn find_stale_unprinted_ids(
    pool: &SqlitePool,
    cutoff_millis: i64,
) -> RepoResult<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM orders WHERE status = 'PENDING' AND created_at < ? \
         AND printed_at IS NULL ORDER BY created_at",
    )
    .bind(cutoff_millis)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Open-order counts per assigned staff member (non-terminal statuses).
pub async fn count_open_by_staff(pool: &SqlitePool) -> RepoResult<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT assigned_staff_id, COUNT(*) FROM orders \
         WHERE assigned_staff_id IS NOT NULL \
         AND status IN ('PENDING', 'AWAITING_PAYMENT', 'CONFIRMED', 'PACKING', 'SHIPPING', 'DELIVERING') \
         GROUP BY assigned_staff_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ============================================================================
// Writes
// ============================================================================

/// Persist a freshly built order with its item snapshots and initial
/// history, atomically.
pub async fn create(pool: &SqlitePool, order: &Order) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO orders (id, user_id, status, payment_method, subtotal, discount, \
         shipping_fee, grand_total, ship_full_name, ship_phone, ship_line1, ship_ward, \
         ship_district, ship_city, assigned_staff_id, inventory_reserved, inventory_reserved_at, \
         inventory_released, inventory_released_at, payment_order_code, printed_at, \
         created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(order.status.as_str())
    .bind(order.payment_method)
    .bind(order.amounts.subtotal)
    .bind(order.amounts.discount)
    .bind(order.amounts.shipping_fee)
    .bind(order.amounts.grand_total)
    .bind(&order.shipping_address.full_name)
    .bind(&order.shipping_address.phone)
    .bind(&order.shipping_address.line1)
    .bind(&order.shipping_address.ward)
    .bind(&order.shipping_address.district)
    .bind(&order.shipping_address.city)
    .bind(&order.assigned_staff_id)
    .bind(order.inventory.reserved)
    .bind(order.inventory.reserved_at)
    .bind(order.inventory.released)
    .bind(order.inventory.released_at)
    .bind(order.payment_order_code)
    .bind(order.printed_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await?;

    for (idx, item) in order.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_items (order_id, idx, product_id, sku, name, image, color, \
             size, unit_price, quantity, line_total) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(idx as i64)
        .bind(&item.product_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.image)
        .bind(&item.color)
        .bind(&item.size)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.line_total)
        .execute(&mut *tx)
        .await?;
    }

    for entry in &order.history {
        append_history(&mut tx, &order.id, entry).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Append one history row. Always called inside the transaction of the
/// mutation it records.
pub async fn append_history(
    conn: &mut SqliteConnection,
    order_id: &str,
    entry: &HistoryEntry,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO order_history (order_id, at, by_user_id, action, from_status, to_status, note) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(entry.at)
    .bind(&entry.by_user_id)
    .bind(&entry.action)
    .bind(entry.from_status.map(|s| s.as_str()))
    .bind(entry.to_status.map(|s| s.as_str()))
    .bind(&entry.note)
    .execute(conn)
    .await?;
    Ok(())
}

/// Move the status edge, guarded by the expected current status.
/// Returns `false` when the order changed concurrently (or is missing).
pub async fn update_status_guarded(
    conn: &mut SqliteConnection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> RepoResult<bool> {
    let rows = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(now_millis())
        .bind(id)
        .bind(from.as_str())
        .execute(conn)
        .await?;
    Ok(rows.rows_affected() == 1)
}

/// Flip the released flag exactly once per order. The guard makes the
/// release path idempotent: the second caller matches zero rows.
pub async fn mark_released_guarded(conn: &mut SqliteConnection, id: &str) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET inventory_released = 1, inventory_released_at = ?, updated_at = ? \
         WHERE id = ? AND inventory_reserved = 1 AND inventory_released = 0",
    )
    .bind(now_millis())
    .bind(now_millis())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Match-and-set claim: only an unassigned, still-pending order can be
/// claimed, and only one of two racing staff members will match.
pub async fn claim_guarded(
    conn: &mut SqliteConnection,
    id: &str,
    staff_id: &str,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET assigned_staff_id = ?, updated_at = ? \
         WHERE id = ? AND assigned_staff_id IS NULL AND status = 'PENDING'",
    )
    .bind(staff_id)
    .bind(now_millis())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Auto-assignment guard: only fills a still-empty slot on a live order,
/// so the balancer can never steal an order a staff member claimed in
/// the meantime.
pub async fn assign_if_unassigned(
    conn: &mut SqliteConnection,
    id: &str,
    staff_id: &str,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET assigned_staff_id = ?, updated_at = ? \
         WHERE id = ? AND assigned_staff_id IS NULL \
         AND status NOT IN ('DONE', 'CANCELLED', 'RETURNED')",
    )
    .bind(staff_id)
    .bind(now_millis())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Explicit (re)assignment, allowed until the order reaches a terminal
/// status.
pub async fn assign_guarded(
    conn: &mut SqliteConnection,
    id: &str,
    staff_id: &str,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET assigned_staff_id = ?, updated_at = ? \
         WHERE id = ? AND status NOT IN ('DONE', 'CANCELLED', 'RETURNED')",
    )
    .bind(staff_id)
    .bind(now_millis())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Stamp `printed_at` once; subsequent calls match zero rows.
pub async fn mark_printed_guarded(conn: &mut SqliteConnection, id: &str) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET printed_at = ?, updated_at = ? \
         WHERE id = ? AND printed_at IS NULL AND status = 'PENDING'",
    )
    .bind(now_millis())
    .bind(now_millis())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Rewrite one line's variant snapshot (variant-edit path).
pub async fn update_item_variant(
    conn: &mut SqliteConnection,
    order_id: &str,
    idx: i64,
    sku: &str,
    color: &Option<String>,
    size: &Option<String>,
    unit_price: i64,
    line_total: i64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE order_items SET sku = ?, color = ?, size = ?, unit_price = ?, line_total = ? \
         WHERE order_id = ? AND idx = ?",
    )
    .bind(sku)
    .bind(color)
    .bind(size)
    .bind(unit_price)
    .bind(line_total)
    .bind(order_id)
    .bind(idx)
    .execute(conn)
    .await?;
    Ok(())
}

/// Recompute amounts after a variant edit, guarded on PENDING so a
/// concurrent transition aborts the edit.
pub async fn update_amounts_guarded(
    conn: &mut SqliteConnection,
    id: &str,
    amounts: &OrderAmounts,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET subtotal = ?, discount = ?, shipping_fee = ?, grand_total = ?, \
         updated_at = ? WHERE id = ? AND status = 'PENDING'",
    )
    .bind(amounts.subtotal)
    .bind(amounts.discount)
    .bind(amounts.shipping_fee)
    .bind(amounts.grand_total)
    .bind(now_millis())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Return reserved stock inside the caller's transaction.
pub async fn restock_items(conn: &mut SqliteConnection, items: &[OrderItem]) -> RepoResult<()> {
    for item in items {
        inventory::increment(conn, &item.product_id, &item.sku, item.quantity).await?;
    }
    Ok(())
}
