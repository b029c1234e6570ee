//! In-memory record store for testing and development

use crate::core::error::{RecordsError, RecordsResult, StorageError};
use crate::core::query::{FetchRequest, Filter, SortKey};
use crate::core::record::Record;
use crate::core::store::RecordStore;
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

type ModuleTable = IndexMap<String, Record>;

/// In-memory record store
///
/// Records are kept per module in insertion order, which is also the
/// listing order when no sort is requested. Uses RwLock for thread-safe
/// access; concurrent writers are last-write-wins.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, ModuleTable>>>,
}

impl InMemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records of a module, deleted ones included
    pub fn len(&self, module: &str) -> RecordsResult<usize> {
        let tables = self.tables.read().map_err(read_lock_error)?;
        Ok(tables.get(module).map_or(0, IndexMap::len))
    }

    pub fn is_empty(&self, module: &str) -> RecordsResult<bool> {
        Ok(self.len(module)? == 0)
    }
}

fn read_lock_error(e: impl std::fmt::Display) -> RecordsError {
    tracing::error!(error = %e, "failed to acquire read lock");
    StorageError::Unavailable {
        backend: "in-memory".to_string(),
    }
    .into()
}

fn write_lock_error(module: &str, e: impl std::fmt::Display) -> RecordsError {
    StorageError::PersistFailed {
        module: module.to_string(),
        message: format!("Failed to acquire write lock: {}", e),
    }
    .into()
}

/// Copy of a record carrying only the requested fields
fn restrict(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    let mut partial = record.clone();
    partial.fields.retain(|name, _| fields.iter().any(|f| f == name));
    partial
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn load(&self, module: &str, id: &str) -> RecordsResult<Option<Record>> {
        let tables = self.tables.read().map_err(read_lock_error)?;

        Ok(tables.get(module).and_then(|t| t.get(id)).cloned())
    }

    async fn count(&self, module: &str, filter: &Filter) -> RecordsResult<u64> {
        let tables = self.tables.read().map_err(read_lock_error)?;

        let count = tables.get(module).map_or(0, |t| {
            t.values()
                .filter(|r| !r.deleted && filter.matches(r))
                .count()
        });
        Ok(count as u64)
    }

    async fn list(&self, request: &FetchRequest) -> RecordsResult<Vec<Record>> {
        let tables = self.tables.read().map_err(read_lock_error)?;

        let Some(table) = tables.get(&request.module) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Record> = table
            .values()
            .filter(|r| request.include_deleted || !r.deleted)
            .filter(|r| request.filter.matches(r))
            .collect();

        if !request.sort.is_empty() {
            rows.sort_by(|a, b| SortKey::compare(&request.sort, a, b));
        }

        Ok(rows
            .into_iter()
            .skip(usize::try_from(request.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(request.limit).unwrap_or(usize::MAX))
            .map(|r| restrict(r, &request.fields))
            .collect())
    }

    async fn persist(&self, record: &mut Record, actor: Option<&str>) -> RecordsResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| write_lock_error(&record.module, e))?;
        let table = tables.entry(record.module.clone()).or_default();

        let is_insert = match record.id.clone() {
            None => {
                record.id = Some(Uuid::new_v4().to_string());
                true
            }
            Some(_) if record.new_with_id => true,
            Some(id) if table.contains_key(&id) => false,
            Some(id) => return Err(RecordsError::not_found(&record.module, &id)),
        };

        record.stamp_audit(actor, Utc::now(), is_insert);
        record.new_with_id = false;

        table.insert(record.id_str().to_string(), record.clone());

        Ok(())
    }

    async fn soft_delete(&self, record: &mut Record, actor: Option<&str>) -> RecordsResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| write_lock_error(&record.module, e))?;

        let stored = tables
            .get_mut(&record.module)
            .and_then(|t| t.get_mut(record.id_str()))
            .ok_or_else(|| RecordsError::not_found(&record.module, record.id_str()))?;

        record.deleted = true;
        record.audit = Default::default();
        record.stamp_audit(actor, Utc::now(), false);
        *stored = record.clone();

        Ok(())
    }
}
