pub mod recorder;
pub mod store;
