pub mod absence;
pub mod admin;
pub mod attendance;
pub mod substitution;
pub mod time_tracking;
