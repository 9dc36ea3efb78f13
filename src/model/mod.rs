pub mod attendance;
pub mod role;
pub mod user;
pub mod work_location;
