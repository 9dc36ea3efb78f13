use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row per user per calendar date. Created at check-in, updated once at
/// check-out, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "08:00:00", value_type = String)]
    pub check_in: NaiveTime,
    #[schema(example = "17:00:00", value_type = String, nullable = true)]
    pub check_out: Option<NaiveTime>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    pub check_in_accuracy: Option<f64>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub check_out_accuracy: Option<f64>,
    pub work_location_id: Option<u64>,
    pub location_validated: bool,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceState {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

impl AttendanceState {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => AttendanceState::NotCheckedIn,
            Some(r) if r.check_out.is_none() => AttendanceState::CheckedIn,
            Some(_) => AttendanceState::CheckedOut,
        }
    }
}
