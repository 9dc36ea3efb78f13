pub mod distance;
pub mod geofence;
