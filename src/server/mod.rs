//! HTTP server for the record API
//!
//! `ServerBuilder` wires a record store, an attachment store, a policy
//! evaluator and an auth provider into a `RecordService` and exposes it
//! through the REST routes.

pub mod builder;
pub mod exposure;
pub mod handlers;
pub mod host;
pub mod params;
pub mod router;

pub use builder::ServerBuilder;
pub use handlers::AppState;
pub use host::ServerHost;
