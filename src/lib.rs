//! # Module Records
//!
//! A JSON:API record service over a generic, dynamically-typed module store.
//!
//! ## Features
//!
//! - **Schema-driven modules**: field types, default fields and relationships come from YAML
//! - **JSON:API documents**: single, list and confirmation documents with relationship links
//! - **Filtering and sorting**: `filter[field][op]`, `sort=-field`, `fields[Module]`
//! - **Pagination**: page meta and first/prev/self/next/last links, plus an "all records" size
//! - **Soft delete**: deleted records stay loadable by id but leave listings
//! - **Audit stamping**: creator, modifier and timestamps unless the caller supplies them
//! - **Attachments**: base64 `filecontents` written to disk for note records
//! - **Policies**: per-module and per-field permissions evaluated outside the record
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use records::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     records::init_tracing();
//!
//!     ServerBuilder::new()
//!         .with_config(ServiceConfig::default_config())
//!         .with_store(InMemoryRecordStore::new())
//!         .serve("127.0.0.1:8080")
//!         .await
//! }
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Install a `tracing` subscriber honoring `RUST_LOG` (default `info`)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{
            Action, AuthContext, AuthPolicy, AuthProvider, ConfigPolicyEvaluator,
            HeaderAuthProvider, NoAuthProvider, PolicyEvaluator,
        },
        document::{DataDocument, DocumentResponse, Meta, PrimaryData},
        error::{RecordsError, RecordsResult},
        field::{FieldType, FieldValue},
        module::{FieldDefinition, ModuleAcl, ModuleDefinition, ModuleRegistry},
        pagination::LinkBase,
        query::{Combinator, Condition, Filter, FilterOp, ListQuery, PageSize},
        record::{AuditFlags, Record},
        service::{RecordService, SaveRequest},
        store::{AttachmentStore, RecordStore},
    };

    // === Storage ===
    pub use crate::storage::{FsAttachmentStore, InMemoryRecordStore};

    // === Config ===
    pub use crate::config::ServiceConfig;

    // === Server ===
    pub use crate::server::{AppState, ServerBuilder, ServerHost};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};

    // === Axum ===
    pub use axum::Router;
}
