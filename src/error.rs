use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use tracing::error;

use crate::attendance::recorder::AttendanceError;
use crate::geo::geofence::SiteDistance;

/// Errors surfaced to HTTP clients. Every body is `{"message": ...}`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    /// Position outside every geofence; carries the nearest site's figures.
    #[display(fmt = "{}", message)]
    OutsideGeofence {
        message: String,
        nearest: Option<SiteDistance>,
    },
    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::OutsideGeofence { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::OutsideGeofence {
                message,
                nearest: Some(site),
            } => json!({
                "message": message,
                "location": site.name,
                "distance_meters": site.distance_meters.round(),
                "radius_meters": site.radius_meters,
            }),
            other => json!({ "message": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<AttendanceError> for ApiError {
    fn from(e: AttendanceError) -> Self {
        match e {
            AttendanceError::OutsideGeofence { message, outcome } => ApiError::OutsideGeofence {
                message: format!("Outside work location: {message}"),
                nearest: outcome.nearest,
            },
            AttendanceError::Store(store_err) => {
                error!(error = %store_err, "Attendance persistence failed");
                ApiError::Internal
            }
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}
