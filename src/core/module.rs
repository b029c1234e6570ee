//! Module schemas
//!
//! A module is a named record type (Accounts, Contacts, Notes, ...). Its
//! definition declares the fields a record may carry, which of them are
//! visible by default, the relationships it exposes and the policies that
//! guard each action.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::error::{RecordError, RecordsResult};
use crate::core::field::FieldType;
use crate::core::record::Record;

/// Fields every module carries, managed partly by the store
pub const AUDIT_FIELDS: &[(&str, FieldType)] = &[
    ("date_entered", FieldType::DateTime),
    ("date_modified", FieldType::DateTime),
    ("modified_user_id", FieldType::String),
    ("modified_by_name", FieldType::String),
    ("created_by", FieldType::String),
    ("created_by_name", FieldType::String),
    ("deleted", FieldType::Boolean),
];

/// Declaration of a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Policy required to read this field (defaults to the module's view policy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            read: None,
        }
    }
}

/// Per-action policy strings, parsed with `AuthPolicy::parse_policy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleAcl {
    #[serde(default = "default_policy")]
    pub view: String,
    #[serde(default = "default_policy")]
    pub save: String,
    #[serde(default = "default_policy")]
    pub delete: String,
}

fn default_policy() -> String {
    "authenticated".to_string()
}

impl Default for ModuleAcl {
    fn default() -> Self {
        Self {
            view: default_policy(),
            save: default_policy(),
            delete: default_policy(),
        }
    }
}

/// Schema of one module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Module name used in URLs and payload `type` (e.g. "Accounts")
    pub name: String,

    /// Object name reported as the document type (e.g. "Account")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDefinition>,

    /// Fields returned when the caller does not ask for specific ones.
    /// Empty means every declared field.
    #[serde(default)]
    pub default_fields: Vec<String>,

    /// Relationship names exposed as links
    #[serde(default)]
    pub relationships: Vec<String>,

    #[serde(default)]
    pub acl: ModuleAcl,
}

impl ModuleDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            object_name: None,
            fields: Vec::new(),
            default_fields: Vec::new(),
            relationships: Vec::new(),
            acl: ModuleAcl::default(),
        }
    }

    pub fn with_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.push(FieldDefinition::new(name, field_type));
        self
    }

    pub fn with_relationship(mut self, name: &str) -> Self {
        self.relationships.push(name.to_string());
        self
    }

    pub fn with_acl(mut self, acl: ModuleAcl) -> Self {
        self.acl = acl;
        self
    }

    /// The type name written into documents
    pub fn object_name(&self) -> &str {
        self.object_name.as_deref().unwrap_or(&self.name)
    }

    /// Look up a declared field, including the audit fields
    pub fn field(&self, name: &str) -> Option<FieldDefinition> {
        if let Some(def) = self.fields.iter().find(|f| f.name == name) {
            return Some(def.clone());
        }
        AUDIT_FIELDS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(n, ty)| FieldDefinition::new(n, *ty))
    }

    pub fn declares(&self, name: &str) -> bool {
        name == "id" || self.field(name).is_some()
    }

    /// All declared field names in declaration order, audit fields last
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.iter().map(|f| f.name.clone()).collect();
        for (name, _) in AUDIT_FIELDS {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    pub fn default_visible_fields(&self) -> Vec<String> {
        if self.default_fields.is_empty() {
            self.field_names()
        } else {
            self.default_fields.clone()
        }
    }
}

/// Registry of all module schemas known to the service
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleDefinition>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = ModuleDefinition>) -> Self {
        let mut registry = Self::new();
        for def in definitions {
            registry.register(def);
        }
        registry
    }

    /// Register a module; a later definition with the same name replaces it
    pub fn register(&mut self, definition: ModuleDefinition) {
        self.modules.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, module: &str) -> RecordsResult<&ModuleDefinition> {
        self.modules.get(module).ok_or_else(|| {
            RecordError::UnknownModule {
                module: module.to_string(),
            }
            .into()
        })
    }

    /// Create an unsaved, permission-checkable shell of a module
    pub fn instantiate(&self, module: &str) -> RecordsResult<Record> {
        let def = self.get(module)?;
        Ok(Record::new(&def.name))
    }

    pub fn default_visible_fields(&self, module: &str) -> RecordsResult<Vec<String>> {
        Ok(self.get(module)?.default_visible_fields())
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.keys().map(|s| s.as_str()).collect()
    }
}
