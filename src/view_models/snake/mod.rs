pub mod round_scheduler;
pub mod session_view_model;
