pub mod absence;
pub mod attendance;
pub mod reconciler;
pub mod substitution;
pub mod work_session;
