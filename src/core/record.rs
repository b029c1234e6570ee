//! Dynamically-typed records

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::field::FieldValue;

/// Audit flags deciding which bookkeeping fields the store overwrites on save
///
/// They are derived from the attribute names a caller submitted, never from
/// the values, and must be set on the record before attributes are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFlags {
    /// Stamp `created_by` with the acting user on insert
    pub set_created_by: bool,
    /// Stamp `modified_user_id` with the acting user
    pub update_modified_by: bool,
    /// Keep a caller-supplied `date_entered`
    pub update_date_entered: bool,
    /// Stamp `date_modified` with the current time
    pub update_date_modified: bool,
}

impl Default for AuditFlags {
    fn default() -> Self {
        Self {
            set_created_by: true,
            update_modified_by: true,
            update_date_entered: false,
            update_date_modified: true,
        }
    }
}

impl AuditFlags {
    /// Derive the flags from the keys of a submitted attribute map
    pub fn from_attribute_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let keys: Vec<&str> = keys.into_iter().collect();
        let has = |k: &str| keys.contains(&k);

        Self {
            set_created_by: !(has("created_by") || has("created_by_name")),
            update_modified_by: !(has("modified_user_id") || has("modified_by_name")),
            update_date_entered: has("date_entered"),
            update_date_modified: !has("date_modified"),
        }
    }
}

/// A single record of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub module: String,

    /// None until the record is saved or given an explicit id
    pub id: Option<String>,

    pub fields: IndexMap<String, FieldValue>,

    pub deleted: bool,

    /// Insert with the caller-assigned id instead of generating one
    pub new_with_id: bool,

    #[serde(skip)]
    pub audit: AuditFlags,
}

impl Record {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            id: None,
            fields: IndexMap::new(),
            deleted: false,
            new_with_id: false,
            audit: AuditFlags::default(),
        }
    }

    /// The record id, or an empty string for unsaved shells
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    /// Value of a field as seen by filters and projection
    ///
    /// `id` and `deleted` are carried on the struct, not in `fields`.
    pub fn value_of(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => self.id.clone().map(FieldValue::String),
            "deleted" => Some(FieldValue::Boolean(self.deleted)),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Apply the audit flags; every store calls this from its persist path
    pub fn stamp_audit(&mut self, actor: Option<&str>, now: DateTime<Utc>, is_insert: bool) {
        let actor_value = || {
            actor
                .map(|a| FieldValue::String(a.to_string()))
                .unwrap_or(FieldValue::Null)
        };

        if is_insert {
            let keep_entered = self.audit.update_date_entered
                && self.get("date_entered").is_some_and(|v| !v.is_null());
            if !keep_entered {
                self.set("date_entered", FieldValue::DateTime(now));
            }
            if self.audit.set_created_by {
                self.set("created_by", actor_value());
            }
        }

        let has_modified = self.get("date_modified").is_some_and(|v| !v.is_null());
        if self.audit.update_date_modified || !has_modified {
            self.set("date_modified", FieldValue::DateTime(now));
        }

        if self.audit.update_modified_by {
            self.set("modified_user_id", actor_value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_flags_without_audit_keys() {
        let flags = AuditFlags::from_attribute_keys(["name", "email"]);
        assert_eq!(flags, AuditFlags::default());
    }

    #[test]
    fn test_flags_with_caller_supplied_audit_keys() {
        let flags = AuditFlags::from_attribute_keys([
            "created_by_name",
            "modified_user_id",
            "date_entered",
            "date_modified",
        ]);
        assert!(!flags.set_created_by);
        assert!(!flags.update_modified_by);
        assert!(flags.update_date_entered);
        assert!(!flags.update_date_modified);
    }

    #[test]
    fn test_stamp_insert_uses_actor_and_now() {
        let now = Utc::now();
        let mut record = Record::new("Accounts");
        record.stamp_audit(Some("u1"), now, true);

        assert_eq!(record.get("created_by"), Some(&FieldValue::String("u1".into())));
        assert_eq!(
            record.get("modified_user_id"),
            Some(&FieldValue::String("u1".into()))
        );
        assert_eq!(record.get("date_entered"), Some(&FieldValue::DateTime(now)));
        assert_eq!(record.get("date_modified"), Some(&FieldValue::DateTime(now)));
    }

    #[test]
    fn test_stamp_preserves_caller_values_when_flagged() {
        let entered = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let modified = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let mut record = Record::new("Accounts");
        record.audit = AuditFlags::from_attribute_keys([
            "created_by",
            "modified_user_id",
            "date_entered",
            "date_modified",
        ]);
        record.set("created_by", FieldValue::String("importer".into()));
        record.set("modified_user_id", FieldValue::String("importer".into()));
        record.set("date_entered", FieldValue::DateTime(entered));
        record.set("date_modified", FieldValue::DateTime(modified));

        record.stamp_audit(Some("u1"), Utc::now(), true);

        assert_eq!(
            record.get("created_by"),
            Some(&FieldValue::String("importer".into()))
        );
        assert_eq!(
            record.get("modified_user_id"),
            Some(&FieldValue::String("importer".into()))
        );
        assert_eq!(record.get("date_entered"), Some(&FieldValue::DateTime(entered)));
        assert_eq!(record.get("date_modified"), Some(&FieldValue::DateTime(modified)));
    }

    #[test]
    fn test_stamp_update_leaves_creation_alone() {
        let entered = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut record = Record::new("Accounts");
        record.set("date_entered", FieldValue::DateTime(entered));
        record.set("created_by", FieldValue::String("original".into()));

        record.stamp_audit(Some("u2"), Utc::now(), false);

        assert_eq!(record.get("date_entered"), Some(&FieldValue::DateTime(entered)));
        assert_eq!(
            record.get("created_by"),
            Some(&FieldValue::String("original".into()))
        );
        assert_eq!(
            record.get("modified_user_id"),
            Some(&FieldValue::String("u2".into()))
        );
    }

    #[test]
    fn test_value_of_struct_fields() {
        let mut record = Record::new("Accounts");
        record.id = Some("a1".into());
        record.deleted = true;
        assert_eq!(record.value_of("id"), Some(FieldValue::String("a1".into())));
        assert_eq!(record.value_of("deleted"), Some(FieldValue::Boolean(true)));
        assert_eq!(record.value_of("name"), None);
    }
}
