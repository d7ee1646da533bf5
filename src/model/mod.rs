pub mod absence;
pub mod attendance;
pub mod role;
pub mod student;
pub mod substitution;
pub mod work_session;
