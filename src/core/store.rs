//! Storage traits consumed by the record service

use async_trait::async_trait;

use crate::core::error::RecordsResult;
use crate::core::query::{FetchRequest, Filter};
use crate::core::record::Record;

/// Backing store of module records
///
/// Implementations own persistence and concurrency control; the service
/// calls them strictly one after another within a request. Soft-deleted
/// records stay loadable by id but are left out of `count` and, unless
/// asked for, out of `list`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a record by id, deleted or not
    async fn load(&self, module: &str, id: &str) -> RecordsResult<Option<Record>>;

    /// Count live records matching the filter
    async fn count(&self, module: &str, filter: &Filter) -> RecordsResult<u64>;

    /// Fetch one window of matching records
    async fn list(&self, request: &FetchRequest) -> RecordsResult<Vec<Record>>;

    /// Insert or update a record, assigning an id to new records without one
    ///
    /// Implementations must call [`Record::stamp_audit`] before writing.
    async fn persist(&self, record: &mut Record, actor: Option<&str>) -> RecordsResult<()>;

    /// Mark a record deleted without removing it
    async fn soft_delete(&self, record: &mut Record, actor: Option<&str>) -> RecordsResult<()>;

    /// Load a record or fail with `NotFound`
    async fn load_or_fail(&self, module: &str, id: &str) -> RecordsResult<Record> {
        self.load(module, id)
            .await?
            .ok_or_else(|| crate::core::error::RecordsError::not_found(module, id))
    }
}

/// File storage for note attachments
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Write the decoded file contents under `key`, replacing any previous file
    async fn write(&self, key: &str, contents: &[u8]) -> RecordsResult<()>;

    /// Read back a stored file
    async fn read(&self, key: &str) -> RecordsResult<Option<Vec<u8>>>;
}
