pub mod auth_flow;
pub mod session_manager;
