//! Product Model
//!
//! Only the slice of the catalog the order subsystem touches: the
//! variant rows that carry the stock counters. Catalog search, pricing
//! rules and media live in other services.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub image: String,
    pub is_active: bool,
}

/// One purchasable variant (color/size combination).
///
/// `stock` is the inventory ledger entry: it is always read and written
/// through the (product_id, sku) compound key and must never go negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ProductVariant {
    pub product_id: String,
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Unit price in VND
    pub price: i64,
    pub stock: i64,
}
