//! Record service orchestrating the get/list/create/update/delete workflows
//!
//! Each operation runs its store calls strictly one after another and
//! aborts on the first error. The service holds no record state between
//! requests: every call re-loads what it needs.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::core::attachment::{AttachmentPayload, AttachmentWorkflow, is_attachment_key};
use crate::core::auth::{Action, AuthContext, PolicyEvaluator};
use crate::core::document::{DocumentResponse, Meta};
use crate::core::error::{ArgumentError, RecordsError, RecordsResult};
use crate::core::field::FieldValue;
use crate::core::module::{ModuleDefinition, ModuleRegistry};
use crate::core::pagination::{LinkBase, paginate};
use crate::core::projection::{AttributeProjector, data_document};
use crate::core::query::{FetchRequest, ListQuery, PageSize, SortKey};
use crate::core::record::{AuditFlags, Record};
use crate::core::store::{AttachmentStore, RecordStore};

/// Attributes that only the store may write
const READ_ONLY_ATTRIBUTES: &[&str] = &["id", "deleted"];

/// A create or update request
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    pub module: String,
    /// Client-assigned id on create, target id on update
    pub id: Option<String>,
    pub attributes: Map<String, Value>,
    /// Request path the response link is derived from
    pub path: String,
}

impl SaveRequest {
    pub fn new(module: &str, attributes: Map<String, Value>) -> Self {
        Self {
            module: module.to_string(),
            attributes,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }
}

/// Orchestrates record workflows over the store, registry and policy
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    registry: Arc<ModuleRegistry>,
    policy: Arc<dyn PolicyEvaluator>,
    attachments: Arc<dyn AttachmentStore>,
    config: Arc<ServiceConfig>,
}

impl RecordService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<ModuleRegistry>,
        policy: Arc<dyn PolicyEvaluator>,
        attachments: Arc<dyn AttachmentStore>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            store,
            registry,
            policy,
            attachments,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Fetch one record
    pub async fn get_record(
        &self,
        context: &AuthContext,
        module: &str,
        id: &str,
        fields: &[String],
        path: &str,
    ) -> RecordsResult<DocumentResponse> {
        debug!(module = %module, id = %id, "get record");

        let def = self.registry.get(module)?;
        let record = self.store.load_or_fail(module, id).await?;
        self.ensure_access(context, def, &record, Action::View)?;

        let doc = data_document(self.policy.as_ref(), context, def, &record, fields, path);
        Ok(DocumentResponse::single(doc))
    }

    /// List one page of records
    ///
    /// Every returned row is re-loaded by id before projection, so a page
    /// costs one count, one fetch and one load per row.
    ///
    /// The count never includes soft-deleted rows, so with `include_deleted`
    /// the page meta and `next`/`last` links can undercount.
    pub async fn list_records(
        &self,
        context: &AuthContext,
        query: &ListQuery,
        links: &LinkBase,
    ) -> RecordsResult<DocumentResponse> {
        let module = query.module.as_str();
        debug!(module = %module, page = ?query.page, "list records");

        let def = self.registry.get(module)?;
        let shell = self.registry.instantiate(module)?;
        self.ensure_access(context, def, &shell, Action::View)?;

        query.filter.validate(def)?;
        SortKey::validate(&query.sort, def)?;

        let requested = if query.fields.is_empty() {
            self.registry.default_visible_fields(module)?
        } else {
            query.fields.clone()
        };
        let readable = AttributeProjector::new(self.policy.as_ref())
            .readable_fields(context, def, &requested);

        let total = self.store.count(module, &query.filter).await?;
        let rows = self
            .store
            .list(&FetchRequest {
                module: module.to_string(),
                filter: query.filter.clone(),
                sort: query.sort.clone(),
                offset: query.page.offset(),
                limit: query.page.limit(self.config.max_limit),
                include_deleted: query.include_deleted,
                fields: readable,
            })
            .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let record = self.store.load_or_fail(module, row.id_str()).await?;
            let link = format!("{}/{}", links.path.trim_end_matches('/'), record.id_str());
            docs.push(data_document(
                self.policy.as_ref(),
                context,
                def,
                &record,
                &requested,
                &link,
            ));
        }

        let returned = docs.len();
        let mut response = DocumentResponse::list(docs);

        if let PageSize::Limited(size) = query.page.size
            && returned > 0
        {
            let (meta, nav) = paginate(total, size, query.page.number, returned, links);
            response.meta = Some(Meta::Pagination(meta));
            response.links = Some(nav);
        }

        debug!(module = %module, total, returned, "listed records");
        Ok(response)
    }

    /// Create a record, optionally with a client-assigned id
    ///
    /// A client-assigned id is inserted as-is; this lets clients that
    /// generate their own identifiers create records in one round trip.
    pub async fn create_record(
        &self,
        context: &AuthContext,
        request: SaveRequest,
    ) -> RecordsResult<DocumentResponse> {
        let module = request.module.as_str();
        debug!(module = %module, id = ?request.id, "create record");

        let def = self.registry.get(module)?;

        if let Some(id) = &request.id
            && let Some(existing) = self.store.load(module, id).await?
            && !existing.deleted
        {
            return Err(ArgumentError::AlreadyExists {
                module: def.object_name().to_string(),
                id: id.clone(),
            }
            .into());
        }

        let mut record = self.registry.instantiate(module)?;
        self.ensure_access(context, def, &record, Action::Save)?;

        if let Some(id) = &request.id {
            record.id = Some(id.clone());
            record.new_with_id = true;
        }

        let saved = self.save(context, def, record, &request).await?;
        info!(module = %module, id = %saved.id_str(), "record created");
        Ok(saved_response(self, context, def, &saved, &request.path))
    }

    /// Update an existing record
    pub async fn update_record(
        &self,
        context: &AuthContext,
        request: SaveRequest,
    ) -> RecordsResult<DocumentResponse> {
        let module = request.module.as_str();
        let id = request.id.clone().ok_or_else(|| ArgumentError::InvalidParameter {
            parameter: "data.id".to_string(),
            message: "an id is required to update a record".to_string(),
        })?;
        debug!(module = %module, id = %id, "update record");

        let def = self.registry.get(module)?;
        let record = self.store.load_or_fail(module, &id).await?;
        self.ensure_access(context, def, &record, Action::Save)?;

        let saved = self.save(context, def, record, &request).await?;
        info!(module = %module, id = %saved.id_str(), "record updated");
        Ok(saved_response(self, context, def, &saved, &request.path))
    }

    /// Soft-delete a record
    pub async fn delete_record(
        &self,
        context: &AuthContext,
        module: &str,
        id: &str,
    ) -> RecordsResult<DocumentResponse> {
        debug!(module = %module, id = %id, "delete record");

        let def = self.registry.get(module)?;
        let mut record = self.store.load_or_fail(module, id).await?;
        self.ensure_access(context, def, &record, Action::Delete)?;

        self.store.soft_delete(&mut record, context.actor_id()).await?;

        info!(module = %module, id = %id, "record deleted");
        Ok(DocumentResponse::message(format!(
            "Record with id {} is deleted",
            id
        )))
    }

    /// Shared create/update tail: flags, copy, persist, attachment, reload
    async fn save(
        &self,
        context: &AuthContext,
        def: &ModuleDefinition,
        mut record: Record,
        request: &SaveRequest,
    ) -> RecordsResult<Record> {
        // Everything is checked before the record is touched.
        let values = coerce_attributes(def, &request.attributes)?;
        let attachment = AttachmentPayload::from_attributes(&request.attributes)?;

        record.audit = AuditFlags::from_attribute_keys(request.attributes.keys().map(String::as_str));
        for (field, value) in values {
            record.set(&field, value);
        }

        let actor = context.actor_id();
        self.store.persist(&mut record, actor).await?;
        let id = record.id_str().to_string();

        if let Some(payload) = attachment {
            AttachmentWorkflow {
                config: &self.config,
                records: self.store.as_ref(),
                files: self.attachments.as_ref(),
            }
            .attach(&id, &payload, actor)
            .await?;
        }

        self.store.load_or_fail(&def.name, &id).await
    }

    fn ensure_access(
        &self,
        context: &AuthContext,
        def: &ModuleDefinition,
        record: &Record,
        action: Action,
    ) -> RecordsResult<()> {
        if self.policy.can_access(context, def, record, action) {
            return Ok(());
        }
        warn!(
            module = %def.name,
            id = %record.id_str(),
            action = %action,
            actor = ?context.actor_id(),
            "access denied"
        );
        Err(RecordsError::denied(&def.name, action))
    }
}

/// Document returned by create and update, linked at `path/id`
fn saved_response(
    service: &RecordService,
    context: &AuthContext,
    def: &ModuleDefinition,
    record: &Record,
    path: &str,
) -> DocumentResponse {
    let link = format!("{}/{}", path.trim_end_matches('/'), record.id_str());
    DocumentResponse::single(data_document(
        service.policy.as_ref(),
        context,
        def,
        record,
        &[],
        &link,
    ))
}

/// Validate and convert submitted attributes against the module schema
///
/// Attachment keys are skipped; they never land on the primary record.
fn coerce_attributes(
    def: &ModuleDefinition,
    attributes: &Map<String, Value>,
) -> RecordsResult<Vec<(String, FieldValue)>> {
    let mut values = Vec::with_capacity(attributes.len());

    for (key, raw) in attributes {
        if is_attachment_key(key) {
            continue;
        }
        if READ_ONLY_ATTRIBUTES.contains(&key.as_str()) {
            return Err(ArgumentError::InvalidValue {
                field: key.clone(),
                message: "attribute is read-only".to_string(),
            }
            .into());
        }

        let field = def.field(key).ok_or_else(|| ArgumentError::UnknownField {
            module: def.name.clone(),
            field: key.clone(),
        })?;

        let value = field
            .field_type
            .coerce(key, raw)
            .map_err(|message| ArgumentError::InvalidValue {
                field: key.clone(),
                message,
            })?;
        values.push((key.clone(), value));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::ConfigPolicyEvaluator;
    use crate::core::query::{Combinator, Condition, Filter, FilterOp};
    use crate::storage::{FsAttachmentStore, InMemoryRecordStore};
    use serde_json::json;

    struct Fixture {
        service: RecordService,
        store: Arc<InMemoryRecordStore>,
        _upload: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let upload = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default_config();
        config.upload_dir = upload.path().to_path_buf();

        let store = Arc::new(InMemoryRecordStore::new());
        let service = RecordService::new(
            store.clone(),
            Arc::new(config.registry()),
            Arc::new(ConfigPolicyEvaluator::new()),
            Arc::new(FsAttachmentStore::new(upload.path())),
            Arc::new(config),
        );
        Fixture {
            service,
            store,
            _upload: upload,
        }
    }

    fn user() -> AuthContext {
        AuthContext::User {
            user_id: "u1".into(),
            roles: vec![],
        }
    }

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn create_account(service: &RecordService, name: &str) -> String {
        let doc = service
            .create_record(
                &user(),
                SaveRequest::new("Accounts", attrs(json!({"name": name}))).with_path("/V8/module"),
            )
            .await
            .unwrap();
        doc.as_single().unwrap().id.clone()
    }

    #[tokio::test]
    async fn test_get_missing_record_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .get_record(&user(), "Accounts", "nope", &[], "/V8/module/Accounts/nope")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RECORD_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_anonymous_cannot_view() {
        let f = fixture();
        let id = create_account(&f.service, "Acme").await;
        let err = f
            .service
            .get_record(&AuthContext::Anonymous, "Accounts", &id, &[], "/x")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCESS_DENIED");
    }

    #[tokio::test]
    async fn test_create_stamps_audit_fields() {
        let f = fixture();
        let id = create_account(&f.service, "Acme").await;
        let record = f.store.load("Accounts", &id).await.unwrap().unwrap();

        assert_eq!(record.get("created_by"), Some(&FieldValue::String("u1".into())));
        assert!(record.get("date_entered").is_some());
    }

    #[tokio::test]
    async fn test_create_with_duplicate_id_fails() {
        let f = fixture();
        let request = SaveRequest::new("Accounts", attrs(json!({"name": "A"}))).with_id("fixed");
        f.service.create_record(&user(), request.clone()).await.unwrap();

        let err = f
            .service
            .create_record(&user(), request.with_path("/V8/module"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RECORD_ALREADY_EXISTS");
        assert!(err.to_string().contains("fixed"));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_attribute_before_persisting() {
        let f = fixture();
        let err = f
            .service
            .create_record(
                &user(),
                SaveRequest::new("Accounts", attrs(json!({"name": "A", "colour": "red"})))
                    .with_id("a1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_FIELD");
        assert!(f.store.load("Accounts", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_caller_modified_date() {
        let f = fixture();
        let id = create_account(&f.service, "Acme").await;

        f.service
            .update_record(
                &user(),
                SaveRequest::new(
                    "Accounts",
                    attrs(json!({"name": "Acme 2", "date_modified": "2020-01-01 00:00:00"})),
                )
                .with_id(&id),
            )
            .await
            .unwrap();

        let record = f.store.load("Accounts", &id).await.unwrap().unwrap();
        assert_eq!(
            record.get("date_modified").map(FieldValue::to_text).as_deref(),
            Some("2020-01-01 00:00:00")
        );
        assert_eq!(record.get("name"), Some(&FieldValue::String("Acme 2".into())));
    }

    #[tokio::test]
    async fn test_update_requires_id() {
        let f = fixture();
        let err = f
            .service
            .update_record(&user(), SaveRequest::new("Accounts", Map::new()))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let f = fixture();
        for i in 0..25 {
            create_account(&f.service, &format!("Account {:02}", i)).await;
        }

        let query = ListQuery::new("Accounts")
            .with_page(PageSize::Limited(10), 2)
            .with_sort("name");
        let base = LinkBase::new("http://crm.local", "/V8/module/Accounts", vec![]);
        let doc = f.service.list_records(&user(), &query, &base).await.unwrap();

        let rows = doc.as_list().unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].attributes["name"], FieldValue::String("Account 10".into()));

        let Some(Meta::Pagination(meta)) = &doc.meta else {
            panic!("expected pagination meta");
        };
        assert_eq!(meta.total_pages, 3);
        let links = doc.links.unwrap();
        assert!(links.prev.is_some());
        assert!(links.next.is_some());
    }

    #[tokio::test]
    async fn test_list_page_past_addressable_rows_is_empty() {
        let f = fixture();
        create_account(&f.service, "Acme").await;

        let query = ListQuery::new("Accounts").with_page(PageSize::Limited(10), u64::MAX);
        let base = LinkBase::new("http://crm.local", "/V8/module/Accounts", vec![]);
        let doc = f.service.list_records(&user(), &query, &base).await.unwrap();

        assert!(doc.as_list().unwrap().is_empty());
        assert!(doc.meta.is_none());
    }

    #[tokio::test]
    async fn test_list_with_deleted_counts_live_rows_only() {
        let f = fixture();
        create_account(&f.service, "Live").await;
        let gone = create_account(&f.service, "Gone").await;
        f.service.delete_record(&user(), "Accounts", &gone).await.unwrap();

        let query = ListQuery::new("Accounts")
            .with_page(PageSize::Limited(1), 1)
            .including_deleted();
        let base = LinkBase::new("http://crm.local", "/V8/module/Accounts", vec![]);
        let doc = f.service.list_records(&user(), &query, &base).await.unwrap();

        let Some(Meta::Pagination(meta)) = &doc.meta else {
            panic!("expected pagination meta");
        };
        assert_eq!(meta.total_pages, 1);
        assert!(doc.links.unwrap().next.is_none());

        let second = ListQuery::new("Accounts")
            .with_page(PageSize::Limited(1), 2)
            .including_deleted();
        let doc = f.service.list_records(&user(), &second, &base).await.unwrap();
        assert_eq!(doc.as_list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_unbounded_has_no_meta() {
        let f = fixture();
        create_account(&f.service, "Acme").await;

        let base = LinkBase::new("http://crm.local", "/V8/module/Accounts", vec![]);
        let doc = f
            .service
            .list_records(&user(), &ListQuery::new("Accounts"), &base)
            .await
            .unwrap();
        assert_eq!(doc.as_list().unwrap().len(), 1);
        assert!(doc.meta.is_none());
        assert!(doc.links.is_none());
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_filter_field() {
        let f = fixture();
        let query = ListQuery::new("Accounts").with_filter(Filter::new(
            Combinator::And,
            vec![Condition::new("colour", FilterOp::Eq, "red")],
        ));
        let base = LinkBase::new("http://crm.local", "/V8/module/Accounts", vec![]);
        assert!(f.service.list_records(&user(), &query, &base).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let f = fixture();
        let id = create_account(&f.service, "Acme").await;

        let doc = f.service.delete_record(&user(), "Accounts", &id).await.unwrap();
        assert_eq!(
            doc.meta,
            Some(Meta::Message {
                message: format!("Record with id {} is deleted", id)
            })
        );

        assert!(
            f.service
                .get_record(&user(), "Accounts", &id, &[], "/x")
                .await
                .is_ok()
        );
        let base = LinkBase::new("http://crm.local", "/V8/module/Accounts", vec![]);
        let listed = f
            .service
            .list_records(&user(), &ListQuery::new("Accounts"), &base)
            .await
            .unwrap();
        assert!(listed.as_list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_note_delete_requires_manager() {
        let f = fixture();
        let doc = f
            .service
            .create_record(&user(), SaveRequest::new("Notes", attrs(json!({"name": "memo"}))))
            .await
            .unwrap();
        let id = doc.as_single().unwrap().id.clone();

        let err = f.service.delete_record(&user(), "Notes", &id).await.unwrap_err();
        assert_eq!(err.error_code(), "ACCESS_DENIED");

        let manager = AuthContext::User {
            user_id: "m1".into(),
            roles: vec!["manager".into()],
        };
        assert!(f.service.delete_record(&manager, "Notes", &id).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_extension_keeps_primary_record() {
        let f = fixture();
        let err = f
            .service
            .create_record(
                &user(),
                SaveRequest::new(
                    "Notes",
                    attrs(json!({"name": "memo", "filename": "run.php", "filecontents": "aGk="})),
                )
                .with_id("n1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILE_EXTENSION");

        let note = f.store.load("Notes", "n1").await.unwrap().unwrap();
        assert_eq!(note.get("name"), Some(&FieldValue::String("memo".into())));
        assert!(note.get("filename").is_none());
    }

    #[tokio::test]
    async fn test_attachment_updates_note() {
        let f = fixture();
        let doc = f
            .service
            .create_record(
                &user(),
                SaveRequest::new(
                    "Notes",
                    attrs(json!({"name": "memo", "filename": "hello.txt", "filecontents": "aGVsbG8="})),
                ),
            )
            .await
            .unwrap();

        let attributes = &doc.as_single().unwrap().attributes;
        assert_eq!(attributes["filename"], FieldValue::String("hello.txt".into()));
        assert_eq!(attributes["uploadfile"], FieldValue::String("hello.txt".into()));
        assert_eq!(attributes["file_mime_type"], FieldValue::String("text/plain".into()));
    }

    #[tokio::test]
    async fn test_attachment_without_note_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .create_record(
                &user(),
                SaveRequest::new(
                    "Accounts",
                    attrs(json!({"name": "Acme", "filename": "a.txt", "filecontents": ""})),
                )
                .with_id("acc1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RECORD_NOT_FOUND");
        assert!(f.store.load("Accounts", "acc1").await.unwrap().is_some());
    }
}
