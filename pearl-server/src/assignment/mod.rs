//! Staff Assignment Balancer
//!
//! Picks the on-duty staff member with the fewest open orders for each
//! new order. Assignment is advisory load-balancing: any failure here is
//! logged by the caller and the order simply stays unassigned for manual
//! claim — it must never fail a checkout.

use chrono::Duration;
use chrono_tz::Tz;
use shared::models::{HistoryEntry, Staff};
use shared::util::now_millis;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::repository::{order as order_repo, staff as staff_repo};
use crate::utils::{AppResult, time};

#[derive(Clone)]
pub struct Balancer {
    pool: SqlitePool,
    tz: Tz,
}

impl Balancer {
    pub fn new(pool: SqlitePool, tz: Tz) -> Self {
        Self { pool, tz }
    }

    /// Active staff whose shift window contains "now", in stable id
    /// order. Yesterday's rows are considered too: a night shift that
    /// started yesterday can still cover the small hours of today.
    pub async fn on_duty_staff(&self) -> AppResult<Vec<Staff>> {
        let now = chrono::Utc::now().with_timezone(&self.tz);
        let today = now.date_naive();
        let dates = vec![
            today.format("%Y-%m-%d").to_string(),
            (today - Duration::days(1)).format("%Y-%m-%d").to_string(),
        ];

        let shifts = staff_repo::find_shifts_for_dates(&self.pool, &dates).await?;
        let mut on_duty_ids: Vec<String> = Vec::new();
        for shift in &shifts {
            let Ok(work_date) = time::parse_date(&shift.work_date) else {
                tracing::warn!(work_date = %shift.work_date, "Skipping shift with bad date");
                continue;
            };
            let start = time::parse_hhmm(&shift.start_time);
            let end = time::parse_hhmm(&shift.end_time);
            if time::shift_window_contains(now, work_date, start, end, self.tz)
                && !on_duty_ids.contains(&shift.staff_id)
            {
                on_duty_ids.push(shift.staff_id.clone());
            }
        }
        if on_duty_ids.is_empty() {
            return Ok(Vec::new());
        }

        // find_active orders by id — that order is the tie-break order
        let staff = staff_repo::find_active(&self.pool).await?;
        Ok(staff
            .into_iter()
            .filter(|s| on_duty_ids.contains(&s.id))
            .collect())
    }

    /// The on-duty staff member with the minimum open-order count.
    /// Ties go to the first candidate encountered.
    pub async fn pick_staff(&self) -> AppResult<Option<Staff>> {
        let candidates = self.on_duty_staff().await?;
        if candidates.is_empty() {
            return Ok(None);
        }
        let counts: HashMap<String, i64> = order_repo::count_open_by_staff(&self.pool)
            .await?
            .into_iter()
            .collect();
        Ok(candidates
            .into_iter()
            .min_by_key(|s| counts.get(&s.id).copied().unwrap_or(0)))
    }

    /// Assign a freshly created order to the least-loaded on-duty staff
    /// member. Returns `Ok(None)` when nobody is on duty; the guarded
    /// write backs off silently if someone claimed the order first.
    pub async fn auto_assign(&self, order_id: &str) -> AppResult<Option<Staff>> {
        let Some(staff) = self.pick_staff().await? else {
            tracing::debug!(order_id = %order_id, "No staff on duty, leaving order unassigned");
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        let assigned = order_repo::assign_if_unassigned(&mut tx, order_id, &staff.id).await?;
        if !assigned {
            tx.rollback().await?;
            tracing::debug!(order_id = %order_id, "Order already assigned, skipping auto-assign");
            return Ok(None);
        }
        let entry = HistoryEntry {
            at: now_millis(),
            by_user_id: None,
            action: "ASSIGNED".to_string(),
            from_status: None,
            to_status: None,
            note: Some(format!("[system] auto-assigned to {}", staff.display_name)),
        };
        order_repo::append_history(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, staff_id = %staff.id, "Order auto-assigned");
        Ok(Some(staff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_order, seed_shift, seed_staff, test_pool};
    use shared::models::OrderStatus;

    const TZ: Tz = chrono_tz::Asia::Ho_Chi_Minh;

    /// Full-day window: end == start spans midnight, covering any "now".
    async fn seed_all_day_shift(pool: &SqlitePool, staff_id: &str) {
        let today = chrono::Utc::now()
            .with_timezone(&TZ)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();
        seed_shift(pool, staff_id, &today, "00:00", "00:00").await;
    }

    #[tokio::test]
    async fn nobody_on_duty_leaves_order_unassigned() {
        let (pool, _dir) = test_pool().await;
        seed_staff(&pool, "st-1", "An").await;
        seed_order(&pool, "o-1", OrderStatus::Pending, None).await;

        let balancer = Balancer::new(pool.clone(), TZ);
        let picked = balancer.auto_assign("o-1").await.unwrap();
        assert!(picked.is_none());

        let order = order_repo::find_by_id(&pool, "o-1").await.unwrap().unwrap();
        assert_eq!(order.assigned_staff_id, None);
    }

    #[tokio::test]
    async fn least_loaded_on_duty_staff_wins() {
        let (pool, _dir) = test_pool().await;
        seed_staff(&pool, "st-1", "An").await;
        seed_staff(&pool, "st-2", "Bình").await;
        seed_all_day_shift(&pool, "st-1").await;
        seed_all_day_shift(&pool, "st-2").await;

        // st-1 already carries two open orders, st-2 carries one
        seed_order(&pool, "o-1", OrderStatus::Confirmed, Some("st-1")).await;
        seed_order(&pool, "o-2", OrderStatus::Packing, Some("st-1")).await;
        seed_order(&pool, "o-3", OrderStatus::Confirmed, Some("st-2")).await;
        seed_order(&pool, "o-new", OrderStatus::Pending, None).await;

        let balancer = Balancer::new(pool.clone(), TZ);
        let picked = balancer.auto_assign("o-new").await.unwrap().unwrap();
        assert_eq!(picked.id, "st-2");

        let order = order_repo::find_by_id(&pool, "o-new").await.unwrap().unwrap();
        assert_eq!(order.assigned_staff_id.as_deref(), Some("st-2"));
        assert!(order.history.iter().any(|h| h.action == "ASSIGNED"));
    }

    #[tokio::test]
    async fn terminal_orders_do_not_count_as_load() {
        let (pool, _dir) = test_pool().await;
        seed_staff(&pool, "st-1", "An").await;
        seed_staff(&pool, "st-2", "Bình").await;
        seed_all_day_shift(&pool, "st-1").await;
        seed_all_day_shift(&pool, "st-2").await;

        // st-1's orders are all finished; st-2 has one live order
        seed_order(&pool, "o-1", OrderStatus::Done, Some("st-1")).await;
        seed_order(&pool, "o-2", OrderStatus::Cancelled, Some("st-1")).await;
        seed_order(&pool, "o-3", OrderStatus::Shipping, Some("st-2")).await;
        seed_order(&pool, "o-new", OrderStatus::Pending, None).await;

        let balancer = Balancer::new(pool.clone(), TZ);
        let picked = balancer.auto_assign("o-new").await.unwrap().unwrap();
        assert_eq!(picked.id, "st-1");
    }

    #[tokio::test]
    async fn tie_breaks_to_first_in_stable_order() {
        let (pool, _dir) = test_pool().await;
        seed_staff(&pool, "st-1", "An").await;
        seed_staff(&pool, "st-2", "Bình").await;
        seed_all_day_shift(&pool, "st-1").await;
        seed_all_day_shift(&pool, "st-2").await;
        seed_order(&pool, "o-new", OrderStatus::Pending, None).await;

        let balancer = Balancer::new(pool.clone(), TZ);
        let picked = balancer.pick_staff().await.unwrap().unwrap();
        assert_eq!(picked.id, "st-1");
    }

    #[tokio::test]
    async fn off_shift_staff_is_not_eligible() {
        let (pool, _dir) = test_pool().await;
        seed_staff(&pool, "st-1", "An").await;
        // A one-minute window in the distant past of the business day
        let today = chrono::Utc::now()
            .with_timezone(&TZ)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();
        seed_shift(&pool, "st-1", &today, "03:00", "03:01").await;

        let balancer = Balancer::new(pool.clone(), TZ);
        let now = chrono::Utc::now().with_timezone(&TZ);
        // Unless the test happens to run in that minute, nobody is on duty
        if !(now.time() >= chrono::NaiveTime::from_hms_opt(3, 0, 0).unwrap()
            && now.time() < chrono::NaiveTime::from_hms_opt(3, 1, 0).unwrap())
        {
            assert!(balancer.pick_staff().await.unwrap().is_none());
        }
    }
}
