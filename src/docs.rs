use crate::api::attendance::{AttendanceListResponse, TodayResponse};
use crate::api::work_location::{CreateWorkLocation, UpdateWorkLocation};
use crate::attendance::recorder::{CheckOutcome, GpsReading};
use crate::geo::distance::Coordinate;
use crate::geo::geofence::{GeofenceOutcome, SiteDistance};
use crate::model::attendance::{AttendanceRecord, AttendanceState};
use crate::model::work_location::{LocationType, WorkLocation};
use crate::models::{CreateUserReq, LoginReqDto, LoginResponse};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clinic Attendance API",
        version = "1.0.0",
        description = r#"
## Clinic attendance with GPS geofencing

Staff, doctors, paramedics, treasury and management record a daily
**check-in** and **check-out**. Each action carries the device's GPS reading,
which is validated against circular geofences around the clinic's
**work locations**.

### Rules
- One check-in and one check-out per user per calendar day
- A position counts when it lies within `radius_meters` of any active work location
- With no active work location configured, the check passes (configurable)
- Without GPS, the action proceeds unvalidated (configurable)
- Work locations are disabled, never deleted; attendance records are never deleted

### Security
Endpoints under `/api/v1` require a **JWT Bearer** token from `/auth/login`.
Work-location management is limited to **Admin** and **Management**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::create_user,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::list_attendance,

        crate::api::work_location::list_locations,
        crate::api::work_location::get_location,
        crate::api::work_location::create_location,
        crate::api::work_location::update_location,
        crate::api::work_location::deactivate_location,
        crate::api::work_location::activate_location
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            CreateUserReq,
            GpsReading,
            Coordinate,
            CheckOutcome,
            GeofenceOutcome,
            SiteDistance,
            AttendanceRecord,
            AttendanceState,
            TodayResponse,
            AttendanceListResponse,
            WorkLocation,
            LocationType,
            CreateWorkLocation,
            UpdateWorkLocation
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and user provisioning"),
        (name = "Attendance", description = "Geofenced check-in / check-out"),
        (name = "WorkLocation", description = "Work location (geofence) management"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
