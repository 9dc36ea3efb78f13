use crate::attendance::recorder::{self, AttendanceContext, GpsReading};
use crate::attendance::store::{HistoryFilter, MySqlAttendanceStore};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::attendance::{AttendanceRecord, AttendanceState};
use crate::model::work_location::WorkLocation;
use crate::utils::location_cache::LocationCache;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    pub state: AttendanceState,
    pub record: Option<AttendanceRecord>,
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceQuery {
    /// Only honoured for admin/management
    pub user_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

fn context(auth: &AuthUser, config: &Config) -> AttendanceContext {
    AttendanceContext {
        user_id: auth.user_id,
        now: config.attendance_now(),
    }
}

async fn active_locations(
    pool: &MySqlPool,
    cache: &LocationCache,
) -> Result<Arc<Vec<WorkLocation>>, ApiError> {
    cache.active_locations(pool).await.map_err(|e| {
        error!(error = %e, "Failed to load work locations");
        ApiError::Internal
    })
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body(
        content = GpsReading,
        description = "Device GPS reading; may be omitted",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Checked in successfully", body = recorder::CheckOutcome),
        (status = 400, description = "Already checked in today, GPS required, or outside every work location", body = Object, example = json!({
            "message": "Outside work location: 556 meters from Main Clinic, max allowed 100m",
            "location": "Main Clinic",
            "distance_meters": 556.0,
            "radius_meters": 100.0
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<LocationCache>,
    payload: Option<web::Json<GpsReading>>,
) -> Result<HttpResponse, ApiError> {
    auth.require_attendance()?;

    let gps = payload.map(|p| p.into_inner()).unwrap_or_default();
    let locations = active_locations(pool.get_ref(), &cache).await?;
    let store = MySqlAttendanceStore::new(pool.get_ref());

    let outcome = recorder::check_in(
        &store,
        &context(&auth, &config),
        &gps,
        &locations,
        &config.geofence_policy(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    request_body(
        content = GpsReading,
        description = "Device GPS reading; may be omitted",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Checked out successfully", body = recorder::CheckOutcome),
        (status = 400, description = "No active check-in, already checked out, or outside every work location", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<LocationCache>,
    payload: Option<web::Json<GpsReading>>,
) -> Result<HttpResponse, ApiError> {
    auth.require_attendance()?;

    let gps = payload.map(|p| p.into_inner()).unwrap_or_default();
    let locations = active_locations(pool.get_ref(), &cache).await?;
    let store = MySqlAttendanceStore::new(pool.get_ref());

    let outcome = recorder::check_out(
        &store,
        &context(&auth, &config),
        &gps,
        &locations,
        &config.geofence_policy(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Today's attendance state for the caller
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Current state", body = TodayResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let store = MySqlAttendanceStore::new(pool.get_ref());
    let (state, record) = recorder::status(&store, &context(&auth, &config)).await?;

    Ok(HttpResponse::Ok().json(TodayResponse { state, record }))
}

/// Attendance history
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 400, description = "from is after to"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::BadRequest("from cannot be after to".into()));
        }
    }

    let filter = HistoryFilter {
        user_id: auth.attendance_scope(query.user_id),
        from: query.from,
        to: query.to,
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(10).clamp(1, 100),
    };

    let store = MySqlAttendanceStore::new(pool.get_ref());
    let (data, total) = recorder::history(&store, &filter).await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page: filter.page,
        per_page: filter.per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use actix_web::{App, HttpMessage, dev::Service, http::StatusCode, test};
    use std::time::Duration;

    macro_rules! app_as {
        ($role:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(
                        MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap(),
                    ))
                    .app_data(web::Data::new(Config::for_tests()))
                    .app_data(web::Data::new(LocationCache::new(Duration::from_secs(60))))
                    .wrap_fn(|req, srv| {
                        req.extensions_mut().insert(AuthUser {
                            user_id: 1,
                            username: "tester".into(),
                            role: $role,
                        });
                        srv.call(req)
                    })
                    .route("/attendance/check-in", web::post().to(check_in))
                    .route("/attendance", web::get().to(list_attendance)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn admin_account_cannot_check_in() {
        let app = app_as!(Role::Admin);
        let req = test::TestRequest::post()
            .uri("/attendance/check-in")
            .set_json(serde_json::json!({"latitude": -6.2, "longitude": 106.816}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn inverted_date_range_is_rejected() {
        let app = app_as!(Role::Doctor);
        let req = test::TestRequest::get()
            .uri("/attendance?from=2026-03-10&to=2026-03-01")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
