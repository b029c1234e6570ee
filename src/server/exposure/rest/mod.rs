//! REST (JSON:API) exposure of the record service
//!
//! The REST exposure consumes a `ServerHost` and produces an Axum `Router`.

use super::super::host::ServerHost;
use crate::server::handlers::AppState;
use crate::server::router::build_record_routes;
use anyhow::Result;
use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with the health routes, the record routes and any
    /// custom routes merged in.
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let state = AppState {
            service: host.service.clone(),
            auth: host.auth.clone(),
        };

        let mut app = Self::health_routes(host).merge(build_record_routes(state));

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app)
    }

    /// Build health check routes
    fn health_routes(host: Arc<ServerHost>) -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
            .with_state(host)
    }

    /// Health check endpoint handler
    async fn health_check(State(host): State<Arc<ServerHost>>) -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "module-records",
            "modules": host.module_names(),
        }))
    }
}
