//! Router builder utilities for record routes

use crate::server::handlers::{
    AppState, create_record, delete_record, get_record, list_records, update_record,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the record routes
///
/// These routes are generic and work for every configured module:
/// - GET /V8/module/{module} - List records
/// - GET /V8/module/{module}/{id} - Get a record
/// - DELETE /V8/module/{module}/{id} - Soft-delete a record
/// - POST /V8/module - Create a record
/// - PATCH /V8/module - Update a record
pub fn build_record_routes(state: AppState) -> Router {
    Router::new()
        .route("/V8/module", post(create_record).patch(update_record))
        .route("/V8/module/{module}", get(list_records))
        .route(
            "/V8/module/{module}/{id}",
            get(get_record).delete(delete_record),
        )
        .with_state(state)
}
