//! HTTP routes for Beacon

pub mod auth_routes;
pub mod health;
pub mod location_routes;
pub mod respond;
pub mod retry_routes;
pub mod session_routes;

pub use auth_routes::{handle_login, handle_logout};
pub use health::{health_check, readiness_check, version_info};
pub use location_routes::handle_location_update;
pub use respond::{error, json_response, not_found, ok};
pub use retry_routes::handle_retry_stats;
pub use session_routes::{
    handle_get_session, handle_list_sessions, handle_session_locations, handle_start_session,
    handle_stop_session,
};
