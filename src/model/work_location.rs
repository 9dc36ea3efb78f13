use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::geo::distance::Coordinate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LocationType {
    Clinic,
    Branch,
    Office,
    Field,
}

impl TryFrom<String> for LocationType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A site staff may check in at. Disabled through `is_active`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Main Clinic",
        "latitude": -6.2,
        "longitude": 106.816,
        "radius_meters": 100.0,
        "is_active": true,
        "location_type": "clinic",
        "address": "Jl. Sudirman 1",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
)]
pub struct WorkLocation {
    pub id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub is_active: bool,
    #[sqlx(try_from = "String")]
    pub location_type: LocationType,
    pub address: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl WorkLocation {
    /// Stored coordinates were range-checked on write, so no validation here.
    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_location(id: u64, name: &str, lat: f64, lon: f64, radius: f64) -> WorkLocation {
    WorkLocation {
        id,
        name: name.to_string(),
        latitude: lat,
        longitude: lon,
        radius_meters: radius,
        is_active: true,
        location_type: LocationType::Clinic,
        address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_type_parses_lowercase_tags() {
        assert_eq!("branch".parse::<LocationType>().unwrap(), LocationType::Branch);
        assert_eq!(LocationType::Field.as_ref(), "field");
        assert!(LocationType::try_from("warehouse".to_string()).is_err());
    }
}
