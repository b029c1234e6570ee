//! Core types of the record service: schema, records, queries, documents

pub mod attachment;
pub mod auth;
pub mod document;
pub mod error;
pub mod field;
pub mod module;
pub mod pagination;
pub mod projection;
pub mod query;
pub mod record;
pub mod service;
pub mod store;

pub use auth::{AuthContext, AuthPolicy, AuthProvider, NoAuthProvider, PolicyEvaluator};
pub use document::{DataDocument, DocumentResponse};
pub use error::{RecordsError, RecordsResult};
pub use field::{FieldType, FieldValue};
pub use module::{ModuleDefinition, ModuleRegistry};
pub use record::{AuditFlags, Record};
pub use service::{RecordService, SaveRequest};
pub use store::{AttachmentStore, RecordStore};
