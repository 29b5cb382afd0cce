//! HTTP routes for the rule library service.
//!
//! - GET / - service index
//! - GET /download_template - spreadsheet template
//! - POST /upload - spreadsheet import
//! - GET /view_data - stored rules
//! - GET /health, /test_db, /init_db, /config_info and POST /clear_data - administration

pub mod admin;
pub mod error;
pub mod import;
pub mod rules;
pub mod template;

use axum::Router;

use crate::AppState;

pub use error::ApiError;

/// Create the router with every endpoint mounted at the root.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(admin::router())
        .merge(import::router())
        .merge(rules::router())
        .merge(template::router())
}
