//! Shared test fixtures: tempfile-backed SQLite pools through the real
//! migrations, plus seed helpers.

use shared::models::{
    AddressSnapshot, CheckoutItem, InventoryFlags, Order, OrderAmounts, OrderStatus, PaymentMethod,
};
use shared::util::now_millis;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Fresh migrated pool. The TempDir guard must be kept alive by the test.
pub(crate) async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let db = crate::db::DbService::new(path.to_str().unwrap()).await.unwrap();
    (db.pool, dir)
}

pub(crate) async fn seed_variant(
    pool: &SqlitePool,
    product_id: &str,
    sku: &str,
    price: i64,
    stock: i64,
) {
    sqlx::query("INSERT OR IGNORE INTO products (id, name) VALUES (?, ?)")
        .bind(product_id)
        .bind(format!("Product {product_id}"))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO product_variants (product_id, sku, color, size, price, stock) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(product_id)
    .bind(sku)
    .bind("black")
    .bind("M")
    .bind(price)
    .bind(stock)
    .execute(pool)
    .await
    .unwrap();
}

pub(crate) async fn seed_staff(pool: &SqlitePool, id: &str, name: &str) {
    sqlx::query("INSERT INTO staff (id, display_name, is_active) VALUES (?, ?, 1)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
}

pub(crate) async fn seed_shift(
    pool: &SqlitePool,
    staff_id: &str,
    work_date: &str,
    start: &str,
    end: &str,
) {
    sqlx::query(
        "INSERT INTO staff_shifts (staff_id, work_date, start_time, end_time) VALUES (?, ?, ?, ?)",
    )
    .bind(staff_id)
    .bind(work_date)
    .bind(start)
    .bind(end)
    .execute(pool)
    .await
    .unwrap();
}

pub(crate) fn checkout_item(product_id: &str, sku: &str, price: i64, quantity: i64) -> CheckoutItem {
    CheckoutItem {
        product_id: product_id.to_string(),
        sku: sku.to_string(),
        name: format!("Product {product_id}"),
        image: String::new(),
        color: Some("black".to_string()),
        size: Some("M".to_string()),
        price,
        quantity,
    }
}

pub(crate) fn sample_address() -> AddressSnapshot {
    AddressSnapshot {
        full_name: "Nguyễn Văn A".to_string(),
        phone: "0901234567".to_string(),
        line1: "12 Lê Lợi".to_string(),
        ward: "Bến Nghé".to_string(),
        district: "Quận 1".to_string(),
        city: "Hồ Chí Minh".to_string(),
    }
}

/// Minimal persisted order for repository/balancer tests that do not go
/// through the checkout path.
pub(crate) async fn seed_order(
    pool: &SqlitePool,
    id: &str,
    status: OrderStatus,
    assignee: Option<&str>,
) {
    let now = now_millis();
    let order = Order {
        id: id.to_string(),
        user_id: "u-1".to_string(),
        items: Vec::new(),
        amounts: OrderAmounts::compute(100_000, 0, 20_000),
        shipping_address: sample_address(),
        payment_method: PaymentMethod::CashOnDelivery,
        status,
        assigned_staff_id: assignee.map(str::to_string),
        inventory: InventoryFlags {
            reserved: true,
            reserved_at: Some(now),
            released: false,
            released_at: None,
        },
        payment_order_code: None,
        printed_at: None,
        created_at: now,
        updated_at: now,
        history: Vec::new(),
    };
    crate::db::repository::order::create(pool, &order).await.unwrap();
}

/// Shift an order's creation time into the past (scheduler tests).
pub(crate) async fn backdate_order(pool: &SqlitePool, order_id: &str, created_at: i64) {
    sqlx::query("UPDATE orders SET created_at = ? WHERE id = ?")
        .bind(created_at)
        .bind(order_id)
        .execute(pool)
        .await
        .unwrap();
}
