//! Inventory Ledger
//!
//! Per-SKU stock counters with all-or-nothing reservation. Every
//! decrement is a single conditional UPDATE; the whole reservation runs
//! in one SQLite transaction, so either every requested quantity is
//! durably removed or none is, as observed by any other caller.
//!
//! Returning stock on cancellation/return goes through the order's
//! release flag (see `orders::service`); [`Ledger::compensate`] exists
//! for the checkout abort path where no order row exists yet.

use shared::models::CheckoutItem;
use sqlx::SqlitePool;

use crate::db::repository::inventory;
use crate::utils::{AppError, AppResult};

/// One (product, SKU) demand line of a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: String,
    pub sku: String,
    pub qty: i64,
}

impl From<&CheckoutItem> for StockLine {
    fn from(item: &CheckoutItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            sku: item.sku.clone(),
            qty: item.quantity,
        }
    }
}

/// Merge duplicate (product, SKU) pairs by summing quantities,
/// preserving first-seen order so the first failing SKU is deterministic.
fn group_lines(lines: &[StockLine]) -> Vec<StockLine> {
    let mut grouped: Vec<StockLine> = Vec::new();
    for line in lines {
        match grouped
            .iter_mut()
            .find(|g| g.product_id == line.product_id && g.sku == line.sku)
        {
            Some(existing) => existing.qty += line.qty,
            None => grouped.push(line.clone()),
        }
    }
    grouped
}

/// The inventory ledger service.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reserve every line or nothing.
    ///
    /// Fails with [`AppError::OutOfStock`] naming the first SKU whose
    /// conditional decrement did not match; the transaction rolls back,
    /// leaving the ledger exactly as it was before the call.
    pub async fn reserve(&self, lines: &[StockLine]) -> AppResult<()> {
        let grouped = group_lines(lines);
        let mut tx = self.pool.begin().await?;
        for line in &grouped {
            let taken =
                inventory::try_decrement(&mut tx, &line.product_id, &line.sku, line.qty).await?;
            if !taken {
                tx.rollback().await?;
                return Err(AppError::OutOfStock {
                    sku: line.sku.clone(),
                });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Give back a reservation made earlier in the same checkout, before
    /// any order row was persisted (e.g. payment-link creation failed).
    pub async fn compensate(&self, lines: &[StockLine]) -> AppResult<()> {
        let grouped = group_lines(lines);
        let mut tx = self.pool.begin().await?;
        for line in &grouped {
            inventory::increment(&mut tx, &line.product_id, &line.sku, line.qty).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn stock_of(&self, product_id: &str, sku: &str) -> AppResult<Option<i64>> {
        Ok(inventory::stock_of(&self.pool, product_id, sku).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_variant, test_pool};

    fn line(sku: &str, qty: i64) -> StockLine {
        StockLine {
            product_id: "p1".to_string(),
            sku: sku.to_string(),
            qty,
        }
    }

    #[tokio::test]
    async fn reserve_decrements_stock() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "TS-BLK-M", 150_000, 10).await;
        let ledger = Ledger::new(pool);

        ledger.reserve(&[line("TS-BLK-M", 3)]).await.unwrap();

        assert_eq!(ledger.stock_of("p1", "TS-BLK-M").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn failed_reserve_is_all_or_nothing() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "TS-BLK-M", 150_000, 10).await;
        seed_variant(&pool, "p1", "TS-BLK-L", 150_000, 1).await;
        let ledger = Ledger::new(pool);

        let err = ledger
            .reserve(&[line("TS-BLK-M", 2), line("TS-BLK-L", 5)])
            .await
            .unwrap_err();
        match err {
            AppError::OutOfStock { sku } => assert_eq!(sku, "TS-BLK-L"),
            other => panic!("expected OutOfStock, got {other:?}"),
        }

        // First SKU's decrement was rolled back
        assert_eq!(ledger.stock_of("p1", "TS-BLK-M").await.unwrap(), Some(10));
        assert_eq!(ledger.stock_of("p1", "TS-BLK-L").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn duplicate_skus_are_grouped_before_reserving() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "TS-BLK-M", 150_000, 1).await;
        let ledger = Ledger::new(pool);

        // 1 + 1 grouped to 2 against stock 1 must fail as a whole
        let err = ledger
            .reserve(&[line("TS-BLK-M", 1), line("TS-BLK-M", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OutOfStock { .. }));
        assert_eq!(ledger.stock_of("p1", "TS-BLK-M").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn unknown_sku_fails_without_side_effects() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "TS-BLK-M", 150_000, 5).await;
        let ledger = Ledger::new(pool);

        let err = ledger
            .reserve(&[line("TS-BLK-M", 1), line("NOPE", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OutOfStock { sku } if sku == "NOPE"));
        assert_eq!(ledger.stock_of("p1", "TS-BLK-M").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn two_concurrent_checkouts_for_last_unit() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 1).await;
        let ledger = Ledger::new(pool);

        let lines_a = [line("X", 1)];
        let lines_b = [line("X", 1)];
        let (a, b) = tokio::join!(
            ledger.reserve(&lines_a),
            ledger.reserve(&lines_b),
        );

        // Exactly one reservation wins
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(ledger.stock_of("p1", "X").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn concurrent_reserves_never_oversell() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 5).await;
        let ledger = Ledger::new(pool);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(
                async move { ledger.reserve(&[line("X", 1)]).await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5, "sum of successful reservations must equal stock");
        assert_eq!(ledger.stock_of("p1", "X").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn compensate_restores_stock() {
        let (pool, _dir) = test_pool().await;
        seed_variant(&pool, "p1", "X", 99_000, 4).await;
        let ledger = Ledger::new(pool);

        let lines = vec![line("X", 3)];
        ledger.reserve(&lines).await.unwrap();
        assert_eq!(ledger.stock_of("p1", "X").await.unwrap(), Some(1));

        ledger.compensate(&lines).await.unwrap();
        assert_eq!(ledger.stock_of("p1", "X").await.unwrap(), Some(4));
    }
}
