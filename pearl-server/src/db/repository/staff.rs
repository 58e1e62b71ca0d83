//! Staff Repository
//!
//! Read-side of the external shift schedule: the order subsystem only
//! needs active staff and their shift windows around "now".

use super::RepoResult;
use shared::models::{Staff, StaffShift};
use sqlx::SqlitePool;

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Staff>> {
    let staff = sqlx::query_as::<_, Staff>(
        "SELECT id, display_name, is_active FROM staff WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(staff)
}

pub async fn find_active(pool: &SqlitePool) -> RepoResult<Vec<Staff>> {
    let staff = sqlx::query_as::<_, Staff>(
        "SELECT id, display_name, is_active FROM staff WHERE is_active = 1 ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(staff)
}

/// Shift rows for the given business dates, joined to active staff.
///
/// Two dates are passed because a night shift started yesterday can
/// still cover "now" (its window spans midnight).
pub async fn find_shifts_for_dates(
    pool: &SqlitePool,
    dates: &[String],
) -> RepoResult<Vec<StaffShift>> {
    if dates.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; dates.len()].join(", ");
    let sql = format!(
        "SELECT ss.staff_id, ss.work_date, ss.start_time, ss.end_time \
         FROM staff_shifts ss JOIN staff s ON s.id = ss.staff_id \
         WHERE s.is_active = 1 AND ss.work_date IN ({placeholders}) \
         ORDER BY ss.staff_id, ss.work_date"
    );
    let mut query = sqlx::query_as::<_, StaffShift>(&sql);
    for date in dates {
        query = query.bind(date.clone());
    }
    let shifts = query.fetch_all(pool).await?;
    Ok(shifts)
}
