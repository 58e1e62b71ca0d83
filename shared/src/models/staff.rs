//! Staff Model (员工与班次)
//!
//! Shift scheduling itself is an external collaborator; the order
//! subsystem only consumes "who is on duty right now" from these rows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Staff {
    pub id: String,
    pub display_name: String,
    pub is_active: bool,
}

/// One scheduled shift window for one staff member.
///
/// The window spans midnight when `end_time <= start_time` (e.g. a
/// 22:00 → 06:00 night shift belongs to `work_date` but extends into the
/// following day).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StaffShift {
    pub staff_id: String,
    /// Business date, `YYYY-MM-DD`
    pub work_date: String,
    /// `HH:MM`
    pub start_time: String,
    /// `HH:MM`
    pub end_time: String,
}
