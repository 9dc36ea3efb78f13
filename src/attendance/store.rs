use chrono::{NaiveDate, NaiveTime};
use derive_more::Display;
use sqlx::MySqlPool;

use crate::geo::distance::Coordinate;
use crate::model::attendance::AttendanceRecord;

#[derive(Debug, Display)]
pub enum StoreError {
    /// Unique `(user_id, date)` key hit, i.e. a racing check-in won.
    #[display(fmt = "attendance record already exists")]
    Duplicate,
    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate;
            }
        }
        StoreError::Database(e)
    }
}

/// A validated GPS reading as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub coordinate: Coordinate,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub user_id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub fix: Option<GpsFix>,
    pub work_location_id: Option<u64>,
    pub location_validated: bool,
}

#[derive(Debug, Clone)]
pub struct CheckOutUpdate {
    pub record_id: u64,
    pub time: NaiveTime,
    pub fix: Option<GpsFix>,
    /// Final flag: check-in result AND check-out result.
    pub location_validated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub user_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: u64,
    pub per_page: u64,
}

impl HistoryFilter {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// Persistence seam for the attendance recorder.
pub trait AttendanceStore {
    async fn find_for_day(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    async fn insert_check_in(&self, new: NewCheckIn) -> Result<AttendanceRecord, StoreError>;

    /// Returns `false` when nothing was updated because the record was
    /// already checked out.
    async fn record_check_out(&self, update: CheckOutUpdate) -> Result<bool, StoreError>;

    /// Newest first. Returns the page and the total row count.
    async fn history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError>;
}

const RECORD_COLUMNS: &str = r#"
    id, user_id, date, check_in, check_out,
    check_in_latitude, check_in_longitude, check_in_accuracy,
    check_out_latitude, check_out_longitude, check_out_accuracy,
    work_location_id, location_validated, created_at, updated_at
"#;

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Date(NaiveDate),
}

pub struct MySqlAttendanceStore<'a> {
    pool: &'a MySqlPool,
}

impl<'a> MySqlAttendanceStore<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: u64) -> Result<AttendanceRecord, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE id = ?");
        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(record)
    }
}

impl AttendanceStore for MySqlAttendanceStore<'_> {
    async fn find_for_day(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE user_id = ? AND date = ?");
        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(self.pool)
            .await?;
        Ok(record)
    }

    async fn insert_check_in(&self, new: NewCheckIn) -> Result<AttendanceRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (user_id, date, check_in,
                 check_in_latitude, check_in_longitude, check_in_accuracy,
                 work_location_id, location_validated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.user_id)
        .bind(new.date)
        .bind(new.time)
        .bind(new.fix.map(|f| f.coordinate.latitude))
        .bind(new.fix.map(|f| f.coordinate.longitude))
        .bind(new.fix.and_then(|f| f.accuracy))
        .bind(new.work_location_id)
        .bind(new.location_validated)
        .execute(self.pool)
        .await?;

        self.fetch_by_id(result.last_insert_id()).await
    }

    async fn record_check_out(&self, update: CheckOutUpdate) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?,
                check_out_latitude = ?,
                check_out_longitude = ?,
                check_out_accuracy = ?,
                location_validated = ?
            WHERE id = ?
            AND check_out IS NULL
            "#,
        )
        .bind(update.time)
        .bind(update.fix.map(|f| f.coordinate.latitude))
        .bind(update.fix.map(|f| f.coordinate.longitude))
        .bind(update.fix.and_then(|f| f.accuracy))
        .bind(update.location_validated)
        .bind(update.record_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(user_id) = filter.user_id {
            where_sql.push_str(" AND user_id = ?");
            args.push(FilterValue::U64(user_id));
        }
        if let Some(from) = filter.from {
            where_sql.push_str(" AND date >= ?");
            args.push(FilterValue::Date(from));
        }
        if let Some(to) = filter.to {
            where_sql.push_str(" AND date <= ?");
            args.push(FilterValue::Date(to));
        }

        let count_sql = format!("SELECT COUNT(*) FROM attendance{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Date(d) => count_q.bind(*d),
            };
        }
        let total = count_q.fetch_one(self.pool).await?;

        let data_sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance{where_sql} ORDER BY date DESC, check_in DESC LIMIT ? OFFSET ?"
        );
        let mut data_q = sqlx::query_as::<_, AttendanceRecord>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Date(d) => data_q.bind(d),
            };
        }
        let rows = data_q
            .bind(filter.per_page)
            .bind(filter.offset())
            .fetch_all(self.pool)
            .await?;

        Ok((rows, total))
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    /// In-process store used by recorder tests.
    #[derive(Default)]
    pub struct MemoryAttendanceStore {
        rows: Mutex<Vec<AttendanceRecord>>,
        pub fail_writes: bool,
    }

    impl MemoryAttendanceStore {
        pub fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Default::default()
            }
        }

        pub fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        pub fn rows(&self) -> Vec<AttendanceRecord> {
            self.rows.lock().unwrap().clone()
        }
    }

    impl AttendanceStore for MemoryAttendanceStore {
        async fn find_for_day(
            &self,
            user_id: u64,
            date: NaiveDate,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|r| r.user_id == user_id && r.date == date)
                .cloned())
        }

        async fn insert_check_in(&self, new: NewCheckIn) -> Result<AttendanceRecord, StoreError> {
            if self.fail_writes {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut rows = self.rows.lock().unwrap();
            if rows
                .iter()
                .any(|r| r.user_id == new.user_id && r.date == new.date)
            {
                return Err(StoreError::Duplicate);
            }
            let now = Utc::now();
            let record = AttendanceRecord {
                id: rows.len() as u64 + 1,
                user_id: new.user_id,
                date: new.date,
                check_in: new.time,
                check_out: None,
                check_in_latitude: new.fix.map(|f| f.coordinate.latitude),
                check_in_longitude: new.fix.map(|f| f.coordinate.longitude),
                check_in_accuracy: new.fix.and_then(|f| f.accuracy),
                check_out_latitude: None,
                check_out_longitude: None,
                check_out_accuracy: None,
                work_location_id: new.work_location_id,
                location_validated: new.location_validated,
                created_at: now,
                updated_at: now,
            };
            rows.push(record.clone());
            Ok(record)
        }

        async fn record_check_out(&self, update: CheckOutUpdate) -> Result<bool, StoreError> {
            if self.fail_writes {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows
                .iter_mut()
                .find(|r| r.id == update.record_id && r.check_out.is_none())
            else {
                return Ok(false);
            };
            row.check_out = Some(update.time);
            row.check_out_latitude = update.fix.map(|f| f.coordinate.latitude);
            row.check_out_longitude = update.fix.map(|f| f.coordinate.longitude);
            row.check_out_accuracy = update.fix.and_then(|f| f.accuracy);
            row.location_validated = update.location_validated;
            row.updated_at = Utc::now();
            Ok(true)
        }

        async fn history(
            &self,
            filter: &HistoryFilter,
        ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
            let mut matching: Vec<AttendanceRecord> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| filter.user_id.is_none_or(|id| r.user_id == id))
                .filter(|r| filter.from.is_none_or(|d| r.date >= d))
                .filter(|r| filter.to.is_none_or(|d| r.date <= d))
                .cloned()
                .collect();
            matching.sort_by(|a, b| (b.date, b.check_in).cmp(&(a.date, a.check_in)));

            let total = matching.len() as i64;
            let page = matching
                .into_iter()
                .skip(filter.offset() as usize)
                .take(filter.per_page as usize)
                .collect();
            Ok((page, total))
        }
    }
}
