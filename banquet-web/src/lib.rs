//! Find My Banquet web frontend: askama pages and JSON acknowledgements over axum.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod router;
pub mod session;
pub mod state;
pub mod templates;

pub use config::Config;
pub use router::app_router;
pub use state::AppState;
