//! Inventory ledger rows (`product_variants.stock`)
//!
//! The stock counter is only ever touched through the (product_id, sku)
//! compound key. The decrement is a single conditional UPDATE, never a
//! read-then-write pair, so concurrent reservations for the same SKU are
//! serialized by the storage layer.

use super::RepoResult;
use shared::models::ProductVariant;
use sqlx::{SqliteConnection, SqlitePool};

const COLUMNS: &str = "product_id, sku, color, size, price, stock";

pub async fn find_variant(
    pool: &SqlitePool,
    product_id: &str,
    sku: &str,
) -> RepoResult<Option<ProductVariant>> {
    let variant = sqlx::query_as::<_, ProductVariant>(&format!(
        "SELECT {COLUMNS} FROM product_variants WHERE product_id = ? AND sku = ?"
    ))
    .bind(product_id)
    .bind(sku)
    .fetch_optional(pool)
    .await?;
    Ok(variant)
}

pub async fn find_variant_by_color_size(
    pool: &SqlitePool,
    product_id: &str,
    color: &str,
    size: &str,
) -> RepoResult<Option<ProductVariant>> {
    let variant = sqlx::query_as::<_, ProductVariant>(&format!(
        "SELECT {COLUMNS} FROM product_variants WHERE product_id = ? AND color = ? AND size = ?"
    ))
    .bind(product_id)
    .bind(color)
    .bind(size)
    .fetch_optional(pool)
    .await?;
    Ok(variant)
}

pub async fn stock_of(pool: &SqlitePool, product_id: &str, sku: &str) -> RepoResult<Option<i64>> {
    let stock: Option<i64> = sqlx::query_scalar(
        "SELECT stock FROM product_variants WHERE product_id = ? AND sku = ?",
    )
    .bind(product_id)
    .bind(sku)
    .fetch_optional(pool)
    .await?;
    Ok(stock)
}

/// Conditional decrement: takes `qty` units only if enough stock remains.
///
/// Returns `false` (no rows touched) when the variant is missing or the
/// remaining stock is insufficient.
pub async fn try_decrement(
    conn: &mut SqliteConnection,
    product_id: &str,
    sku: &str,
    qty: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE product_variants SET stock = stock - ?3 \
         WHERE product_id = ?1 AND sku = ?2 AND stock >= ?3",
    )
    .bind(product_id)
    .bind(sku)
    .bind(qty)
    .execute(conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Unconditional increment, used to return stock on cancellation/return
/// and to compensate an aborted checkout.
pub async fn increment(
    conn: &mut SqliteConnection,
    product_id: &str,
    sku: &str,
    qty: i64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE product_variants SET stock = stock + ?3 WHERE product_id = ?1 AND sku = ?2",
    )
    .bind(product_id)
    .bind(sku)
    .bind(qty)
    .execute(conn)
    .await?;
    Ok(())
}
