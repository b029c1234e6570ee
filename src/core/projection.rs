//! Projection of records into documents
//!
//! The attribute projector flattens a record into `field -> value`,
//! restricted to the requested field set and to fields the caller may read.
//! Unknown and unreadable fields are left out without error. The
//! relationship projector turns declared relations into link pairs.

use indexmap::IndexMap;

use crate::core::auth::{AuthContext, PolicyEvaluator};
use crate::core::document::{DataDocument, Relationship, RelationshipLinks};
use crate::core::field::FieldValue;
use crate::core::module::ModuleDefinition;
use crate::core::record::Record;

/// Builds the `attributes` member of a document
pub struct AttributeProjector<'a> {
    policy: &'a dyn PolicyEvaluator,
}

impl<'a> AttributeProjector<'a> {
    pub fn new(policy: &'a dyn PolicyEvaluator) -> Self {
        Self { policy }
    }

    /// Fields the caller may read out of `requested` (or the module defaults)
    pub fn readable_fields(
        &self,
        context: &AuthContext,
        module: &ModuleDefinition,
        requested: &[String],
    ) -> Vec<String> {
        let candidates = if requested.is_empty() {
            module.default_visible_fields()
        } else {
            requested.to_vec()
        };

        candidates
            .into_iter()
            .filter(|f| f != "id")
            .filter(|f| module.declares(f))
            .filter(|f| self.policy.can_read_field(context, module, f))
            .collect()
    }

    pub fn project(
        &self,
        context: &AuthContext,
        module: &ModuleDefinition,
        record: &Record,
        requested: &[String],
    ) -> IndexMap<String, FieldValue> {
        self.readable_fields(context, module, requested)
            .into_iter()
            .map(|field| {
                let value = record.value_of(&field).unwrap_or(FieldValue::Null);
                (field, value)
            })
            .collect()
    }
}

/// Builds the `relationships` member of a document
pub struct RelationshipProjector;

impl RelationshipProjector {
    pub fn project(module: &ModuleDefinition, base_path: &str) -> IndexMap<String, Relationship> {
        let base = base_path.trim_end_matches('/');
        module
            .relationships
            .iter()
            .map(|name| {
                let url = format!("{}/relationships/{}", base, name);
                (
                    name.clone(),
                    Relationship {
                        links: RelationshipLinks {
                            self_link: url.clone(),
                            related: url,
                        },
                    },
                )
            })
            .collect()
    }
}

/// Assemble the full resource object of a record
pub fn data_document(
    policy: &dyn PolicyEvaluator,
    context: &AuthContext,
    module: &ModuleDefinition,
    record: &Record,
    fields: &[String],
    base_path: &str,
) -> DataDocument {
    let mut doc = DataDocument::new(module.object_name(), record.id_str());
    doc.attributes = AttributeProjector::new(policy).project(context, module, record, fields);
    doc.relationships = RelationshipProjector::project(module, base_path);
    doc
}
