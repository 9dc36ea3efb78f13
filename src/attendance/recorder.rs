use chrono::{NaiveDateTime, NaiveTime, SubsecRound};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::attendance::store::{
    AttendanceStore, CheckOutUpdate, GpsFix, HistoryFilter, NewCheckIn, StoreError,
};
use crate::geo::distance::Coordinate;
use crate::geo::geofence::{GeofenceOutcome, GeofencePolicy, validate_position};
use crate::model::attendance::{AttendanceRecord, AttendanceState};
use crate::model::work_location::WorkLocation;

/// Who is acting and when, in the attendance clock's local time.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceContext {
    pub user_id: u64,
    pub now: NaiveDateTime,
}

impl AttendanceContext {
    /// Clock time as stored: whole seconds, since the TIME columns keep no fraction.
    pub fn time(&self) -> NaiveTime {
        self.now.time().trunc_subsecs(0)
    }
}

/// GPS reading as sent by the client. Every field is optional.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct GpsReading {
    #[schema(example = json!(-6.2))]
    pub latitude: Option<f64>,
    #[schema(example = 106.8161)]
    pub longitude: Option<f64>,
    /// Reported accuracy radius in meters
    #[schema(example = 12.5)]
    pub accuracy: Option<f64>,
}

impl GpsReading {
    /// `None` when the reading is missing or unusable.
    pub fn fix(&self) -> Option<GpsFix> {
        let (lat, lon) = (self.latitude?, self.longitude?);
        let coordinate = match Coordinate::new(lat, lon) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "Discarding invalid GPS reading");
                return None;
            }
        };
        let accuracy = self.accuracy.filter(|a| a.is_finite() && *a >= 0.0);

        Some(GpsFix {
            coordinate,
            accuracy,
        })
    }
}

#[derive(Debug, Display)]
pub enum AttendanceError {
    #[display(fmt = "Already checked in today")]
    AlreadyCheckedIn,
    #[display(fmt = "No active check-in found for today")]
    NotCheckedIn,
    #[display(fmt = "Already checked out today")]
    AlreadyCheckedOut,
    #[display(fmt = "Check-out time must be after check-in time")]
    InvalidTimeline,
    #[display(fmt = "GPS location is required")]
    GpsRequired,
    #[display(fmt = "No active work location is configured")]
    NoWorkLocation,
    #[display(fmt = "Outside work location: {}", message)]
    OutsideGeofence {
        message: String,
        outcome: GeofenceOutcome,
    },
    #[display(fmt = "{}", _0)]
    Store(StoreError),
}

impl std::error::Error for AttendanceError {}

impl From<StoreError> for AttendanceError {
    fn from(e: StoreError) -> Self {
        AttendanceError::Store(e)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckOutcome {
    pub message: String,
    pub record: AttendanceRecord,
    /// Absent when no GPS reading was supplied.
    pub geofence: Option<GeofenceOutcome>,
}

struct LocationCheck {
    fix: Option<GpsFix>,
    outcome: Option<GeofenceOutcome>,
}

impl LocationCheck {
    fn confirmed(&self) -> bool {
        self.outcome.as_ref().is_some_and(GeofenceOutcome::confirmed)
    }

    fn matched_location(&self) -> Option<u64> {
        self.outcome
            .as_ref()
            .and_then(|o| o.matched.as_ref())
            .map(|m| m.location_id)
    }

    fn describe(&self) -> String {
        match &self.outcome {
            Some(outcome) => outcome.message.clone(),
            None => "No GPS provided, location not validated".to_string(),
        }
    }
}

fn check_location(
    ctx: &AttendanceContext,
    gps: &GpsReading,
    locations: &[WorkLocation],
    policy: &GeofencePolicy,
) -> Result<LocationCheck, AttendanceError> {
    let Some(fix) = gps.fix() else {
        if policy.require_gps {
            warn!(user_id = ctx.user_id, "Rejected attendance without GPS");
            return Err(AttendanceError::GpsRequired);
        }
        if policy.require_configured && !locations.iter().any(|loc| loc.is_active) {
            warn!(user_id = ctx.user_id, "Rejected attendance, no active work location");
            return Err(AttendanceError::NoWorkLocation);
        }
        return Ok(LocationCheck {
            fix: None,
            outcome: None,
        });
    };

    let outcome = validate_position(fix.coordinate, fix.accuracy, locations, policy);
    if !outcome.valid {
        warn!(
            user_id = ctx.user_id,
            distance_meters = outcome.nearest.as_ref().map(|n| n.distance_meters),
            location_id = outcome.nearest.as_ref().map(|n| n.location_id),
            "Geofence check failed"
        );
        return Err(AttendanceError::OutsideGeofence {
            message: outcome.message.clone(),
            outcome,
        });
    }

    Ok(LocationCheck {
        fix: Some(fix),
        outcome: Some(outcome),
    })
}

pub async fn status<S: AttendanceStore>(
    store: &S,
    ctx: &AttendanceContext,
) -> Result<(AttendanceState, Option<AttendanceRecord>), AttendanceError> {
    let record = store.find_for_day(ctx.user_id, ctx.now.date()).await?;
    Ok((AttendanceState::of(record.as_ref()), record))
}

/// NotCheckedIn -> CheckedIn.
pub async fn check_in<S: AttendanceStore>(
    store: &S,
    ctx: &AttendanceContext,
    gps: &GpsReading,
    locations: &[WorkLocation],
    policy: &GeofencePolicy,
) -> Result<CheckOutcome, AttendanceError> {
    let date = ctx.now.date();

    if store.find_for_day(ctx.user_id, date).await?.is_some() {
        return Err(AttendanceError::AlreadyCheckedIn);
    }

    let check = check_location(ctx, gps, locations, policy)?;

    let new = NewCheckIn {
        user_id: ctx.user_id,
        date,
        time: ctx.time(),
        fix: check.fix,
        work_location_id: check.matched_location(),
        location_validated: check.confirmed(),
    };

    let record = store.insert_check_in(new).await.map_err(|e| match e {
        StoreError::Duplicate => AttendanceError::AlreadyCheckedIn,
        other => AttendanceError::Store(other),
    })?;

    info!(
        user_id = ctx.user_id,
        location_id = record.work_location_id,
        validated = record.location_validated,
        "Checked in"
    );

    Ok(CheckOutcome {
        message: format!("Checked in successfully. {}", check.describe()),
        record,
        geofence: check.outcome,
    })
}

/// CheckedIn -> CheckedOut. At most once per date.
pub async fn check_out<S: AttendanceStore>(
    store: &S,
    ctx: &AttendanceContext,
    gps: &GpsReading,
    locations: &[WorkLocation],
    policy: &GeofencePolicy,
) -> Result<CheckOutcome, AttendanceError> {
    let date = ctx.now.date();

    let record = store
        .find_for_day(ctx.user_id, date)
        .await?
        .ok_or(AttendanceError::NotCheckedIn)?;

    if record.check_out.is_some() {
        return Err(AttendanceError::AlreadyCheckedOut);
    }

    let time = ctx.time();
    if time <= record.check_in {
        return Err(AttendanceError::InvalidTimeline);
    }

    let check = check_location(ctx, gps, locations, policy)?;

    let updated = store
        .record_check_out(CheckOutUpdate {
            record_id: record.id,
            time,
            fix: check.fix,
            location_validated: record.location_validated && check.confirmed(),
        })
        .await?;

    // Lost a race against another check-out for the same record.
    if !updated {
        return Err(AttendanceError::AlreadyCheckedOut);
    }

    let record = store
        .find_for_day(ctx.user_id, date)
        .await?
        .ok_or(AttendanceError::NotCheckedIn)?;

    info!(
        user_id = ctx.user_id,
        validated = record.location_validated,
        "Checked out"
    );

    Ok(CheckOutcome {
        message: format!("Checked out successfully. {}", check.describe()),
        record,
        geofence: check.outcome,
    })
}

pub async fn history<S: AttendanceStore>(
    store: &S,
    filter: &HistoryFilter,
) -> Result<(Vec<AttendanceRecord>, i64), AttendanceError> {
    Ok(store.history(filter).await?)
}
