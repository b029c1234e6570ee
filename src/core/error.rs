//! Typed error handling for the record service
//!
//! Every failure surfaced by the service belongs to one of a small number of
//! categories, each mapped to an HTTP status and a stable error code:
//!
//! - [`AccessError`]: the caller lacks permission for the action
//! - [`RecordError`]: the module or record does not exist
//! - [`ArgumentError`]: the request is invalid (duplicate id, bad field,
//!   bad attachment)
//! - [`StorageError`]: persisting a record or writing an attachment failed
//! - [`ConfigError`]: configuration could not be loaded
//!
//! # Example
//!
//! ```rust,ignore
//! match service.get_record(&ctx, "Accounts", id, &[], path).await {
//!     Ok(doc) => println!("{:?}", doc),
//!     Err(RecordsError::Record(RecordError::NotFound { id, .. })) => {
//!         println!("record {} not found", id);
//!     }
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

use crate::core::auth::Action;

/// The main error type of the record service
#[derive(Debug)]
pub enum RecordsError {
    /// Permission checks
    Access(AccessError),

    /// Missing modules or records
    Record(RecordError),

    /// Invalid input
    Argument(ArgumentError),

    /// Persistence and file storage failures
    Storage(StorageError),

    /// Configuration errors
    Config(ConfigError),
}

impl fmt::Display for RecordsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordsError::Access(e) => write!(f, "{}", e),
            RecordsError::Record(e) => write!(f, "{}", e),
            RecordsError::Argument(e) => write!(f, "{}", e),
            RecordsError::Storage(e) => write!(f, "{}", e),
            RecordsError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RecordsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordsError::Access(e) => Some(e),
            RecordsError::Record(e) => Some(e),
            RecordsError::Argument(e) => Some(e),
            RecordsError::Storage(e) => Some(e),
            RecordsError::Config(e) => Some(e),
        }
    }
}

/// A single JSON:API error object
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    /// HTTP status as a string, per JSON:API
    pub status: String,
    /// Error code for programmatic handling
    pub code: String,
    /// Short summary of the error category
    pub title: String,
    /// Human-readable error message
    pub detail: String,
}

/// Error document returned to HTTP clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorObject>,
}

impl RecordsError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecordsError::Access(_) => StatusCode::FORBIDDEN,
            RecordsError::Record(_) => StatusCode::NOT_FOUND,
            RecordsError::Argument(_) => StatusCode::BAD_REQUEST,
            RecordsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RecordsError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            RecordsError::Access(_) => "ACCESS_DENIED",
            RecordsError::Record(e) => e.error_code(),
            RecordsError::Argument(e) => e.error_code(),
            RecordsError::Storage(e) => e.error_code(),
            RecordsError::Config(_) => "CONFIG_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            RecordsError::Access(_) => "Access Denied",
            RecordsError::Record(_) => "Not Found",
            RecordsError::Argument(_) => "Invalid Argument",
            RecordsError::Storage(_) => "Storage Failure",
            RecordsError::Config(_) => "Internal Error",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            errors: vec![ErrorObject {
                status: self.status_code().as_u16().to_string(),
                code: self.error_code().to_string(),
                title: self.title().to_string(),
                detail: self.to_string(),
            }],
        }
    }

    /// Shorthand for the most common failure
    pub fn not_found(module: &str, id: &str) -> Self {
        RecordsError::Record(RecordError::NotFound {
            module: module.to_string(),
            id: id.to_string(),
        })
    }

    /// Shorthand for a failed permission check
    pub fn denied(module: &str, action: Action) -> Self {
        RecordsError::Access(AccessError::Denied {
            module: module.to_string(),
            action,
        })
    }
}

impl IntoResponse for RecordsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Access Errors
// =============================================================================

/// Errors raised by permission checks
#[derive(Debug)]
pub enum AccessError {
    /// The caller may not perform `action` on `module`
    Denied { module: String, action: Action },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::Denied { module, action } => {
                write!(f, "Access denied: cannot {} {}", action, module)
            }
        }
    }
}

impl std::error::Error for AccessError {}

impl From<AccessError> for RecordsError {
    fn from(err: AccessError) -> Self {
        RecordsError::Access(err)
    }
}

// =============================================================================
// Record Errors
// =============================================================================

/// Errors related to locating records
#[derive(Debug)]
pub enum RecordError {
    /// No record with this id exists in the module
    NotFound { module: String, id: String },

    /// The module is not registered
    UnknownModule { module: String },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::NotFound { module, id } => {
                write!(f, "{} with id '{}' not found", module, id)
            }
            RecordError::UnknownModule { module } => {
                write!(f, "Unknown module: {}", module)
            }
        }
    }
}

impl std::error::Error for RecordError {}

impl RecordError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RecordError::NotFound { .. } => "RECORD_NOT_FOUND",
            RecordError::UnknownModule { .. } => "UNKNOWN_MODULE",
        }
    }
}

impl From<RecordError> for RecordsError {
    fn from(err: RecordError) -> Self {
        RecordsError::Record(err)
    }
}

// =============================================================================
// Argument Errors
// =============================================================================

/// Errors caused by invalid caller input
#[derive(Debug)]
pub enum ArgumentError {
    /// A client-supplied id collides with a live record
    AlreadyExists { module: String, id: String },

    /// An attribute name is not declared by the module
    UnknownField { module: String, field: String },

    /// An attribute value does not fit the declared field type
    InvalidValue { field: String, message: String },

    /// The attachment filename has no extension or a denylisted one
    InvalidExtension { filename: String },

    /// The attachment payload is not valid base64
    InvalidEncoding { message: String },

    /// A request parameter is malformed
    InvalidParameter { parameter: String, message: String },
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::AlreadyExists { module, id } => {
                write!(f, "Bean {} with id {} is already exist", module, id)
            }
            ArgumentError::UnknownField { module, field } => {
                write!(f, "Property '{}' does not exist in module {}", field, module)
            }
            ArgumentError::InvalidValue { field, message } => {
                write!(f, "Invalid value for field '{}': {}", field, message)
            }
            ArgumentError::InvalidExtension { filename } => {
                write!(
                    f,
                    "File upload failed: File extension is not included or is not valid ({})",
                    filename
                )
            }
            ArgumentError::InvalidEncoding { message } => {
                write!(f, "File upload failed: invalid file contents: {}", message)
            }
            ArgumentError::InvalidParameter { parameter, message } => {
                write!(f, "Invalid parameter '{}': {}", parameter, message)
            }
        }
    }
}

impl std::error::Error for ArgumentError {}

impl ArgumentError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ArgumentError::AlreadyExists { .. } => "RECORD_ALREADY_EXISTS",
            ArgumentError::UnknownField { .. } => "UNKNOWN_FIELD",
            ArgumentError::InvalidValue { .. } => "INVALID_VALUE",
            ArgumentError::InvalidExtension { .. } => "INVALID_FILE_EXTENSION",
            ArgumentError::InvalidEncoding { .. } => "INVALID_FILE_CONTENTS",
            ArgumentError::InvalidParameter { .. } => "INVALID_PARAMETER",
        }
    }
}

impl From<ArgumentError> for RecordsError {
    fn from(err: ArgumentError) -> Self {
        RecordsError::Argument(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by the record store or the attachment store
#[derive(Debug)]
pub enum StorageError {
    /// Writing an attachment file failed
    WriteFailed { path: String, message: String },

    /// Reading back an attachment file failed
    ReadFailed { path: String, message: String },

    /// Persisting a record failed
    PersistFailed { module: String, message: String },

    /// The backend cannot be reached
    Unavailable { backend: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::WriteFailed { path, message } => {
                write!(f, "Failed to write file '{}': {}", path, message)
            }
            StorageError::ReadFailed { path, message } => {
                write!(f, "Failed to read file '{}': {}", path, message)
            }
            StorageError::PersistFailed { module, message } => {
                write!(f, "Failed to save {}: {}", module, message)
            }
            StorageError::Unavailable { backend } => {
                write!(f, "Storage backend '{}' is unavailable", backend)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::WriteFailed { .. } => "FILE_WRITE_FAILED",
            StorageError::ReadFailed { .. } => "FILE_READ_FAILED",
            StorageError::PersistFailed { .. } => "PERSIST_FAILED",
            StorageError::Unavailable { .. } => "STORAGE_UNAVAILABLE",
        }
    }
}

impl From<StorageError> for RecordsError {
    fn from(err: StorageError) -> Self {
        RecordsError::Storage(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to parse the configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration parsed but is inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for RecordsError {
    fn from(err: ConfigError) -> Self {
        RecordsError::Config(err)
    }
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(err: validator::ValidationErrors) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

/// A specialized Result type for record service operations
pub type RecordsResult<T> = Result<T, RecordsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = RecordsError::not_found("Accounts", "abc");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "RECORD_NOT_FOUND");
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_denied_maps_to_403() {
        let err = RecordsError::denied("Accounts", Action::Delete);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), "ACCESS_DENIED");
        assert!(err.to_string().contains("delete"));
    }

    #[test]
    fn test_argument_errors_map_to_400() {
        let errors: Vec<RecordsError> = vec![
            ArgumentError::AlreadyExists {
                module: "Accounts".into(),
                id: "1".into(),
            }
            .into(),
            ArgumentError::InvalidExtension {
                filename: "noext".into(),
            }
            .into(),
            ArgumentError::UnknownField {
                module: "Accounts".into(),
                field: "bogus".into(),
            }
            .into(),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_already_exists_message() {
        let err = ArgumentError::AlreadyExists {
            module: "Accounts".into(),
            id: "42".into(),
        };
        assert_eq!(err.to_string(), "Bean Accounts with id 42 is already exist");
    }

    #[test]
    fn test_storage_error_maps_to_500() {
        let err: RecordsError = StorageError::WriteFailed {
            path: "upload/x".into(),
            message: "disk full".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "FILE_WRITE_FAILED");
    }

    #[test]
    fn test_error_response_shape() {
        let err = RecordsError::not_found("Notes", "n1");
        let body = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(body["errors"][0]["status"], "404");
        assert_eq!(body["errors"][0]["code"], "RECORD_NOT_FOUND");
        assert_eq!(body["errors"][0]["title"], "Not Found");
    }

    #[test]
    fn test_config_error_from_yaml() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("a: [").unwrap_err();
        let err: RecordsError = ConfigError::from(yaml_err).into();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
