//! JSON:API response documents

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::core::field::FieldValue;
use crate::core::pagination::{PaginationLinks, PaginationMeta};

/// Links of one relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub related: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub links: RelationshipLinks,
}

/// A single resource object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataDocument {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: String,
    pub attributes: IndexMap<String, FieldValue>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub relationships: IndexMap<String, Relationship>,
}

impl DataDocument {
    pub fn new(doc_type: &str, id: &str) -> Self {
        Self {
            doc_type: doc_type.to_string(),
            id: id.to_string(),
            attributes: IndexMap::new(),
            relationships: IndexMap::new(),
        }
    }
}

/// Primary data of a document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Single(Box<DataDocument>),
    List(Vec<DataDocument>),
}

/// Top-level `meta` member
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Meta {
    Pagination(PaginationMeta),
    Message { message: String },
    Other(Value),
}

/// Top-level response document
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DocumentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PrimaryData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<PaginationLinks>,
}

impl DocumentResponse {
    pub fn single(data: DataDocument) -> Self {
        Self {
            data: Some(PrimaryData::Single(Box::new(data))),
            ..Self::default()
        }
    }

    pub fn list(data: Vec<DataDocument>) -> Self {
        Self {
            data: Some(PrimaryData::List(data)),
            ..Self::default()
        }
    }

    pub fn message(message: String) -> Self {
        Self {
            meta: Some(Meta::Message { message }),
            ..Self::default()
        }
    }

    /// The single resource, if this document carries one
    pub fn as_single(&self) -> Option<&DataDocument> {
        match &self.data {
            Some(PrimaryData::Single(doc)) => Some(doc),
            _ => None,
        }
    }

    /// The resource list, if this document carries one
    pub fn as_list(&self) -> Option<&[DataDocument]> {
        match &self.data {
            Some(PrimaryData::List(docs)) => Some(docs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_document_shape() {
        let mut doc = DataDocument::new("Account", "a1");
        doc.attributes
            .insert("name".into(), FieldValue::String("Acme".into()));
        doc.relationships.insert(
            "contacts".into(),
            Relationship {
                links: RelationshipLinks {
                    self_link: "/V8/module/Accounts/a1/relationships/contacts".into(),
                    related: "/V8/module/Accounts/a1/relationships/contacts".into(),
                },
            },
        );

        let json = serde_json::to_value(DocumentResponse::single(doc)).unwrap();
        assert_eq!(json["data"]["type"], "Account");
        assert_eq!(json["data"]["attributes"]["name"], "Acme");
        assert_eq!(
            json["data"]["relationships"]["contacts"]["links"]["related"],
            "/V8/module/Accounts/a1/relationships/contacts"
        );
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_message_document_shape() {
        let json =
            serde_json::to_value(DocumentResponse::message("Record with id 1 is deleted".into()))
                .unwrap();
        assert_eq!(json, json!({"meta": {"message": "Record with id 1 is deleted"}}));
    }

    #[test]
    fn test_empty_list_serializes_array() {
        let json = serde_json::to_value(DocumentResponse::list(vec![])).unwrap();
        assert_eq!(json, json!({"data": []}));
    }
}
