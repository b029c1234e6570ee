//! Inline file attachments on create/update
//!
//! A create or update payload may carry `filename` and `filecontents`
//! (base64). They are never copied onto the primary record: after the
//! primary record is saved, the note record sharing its id is re-loaded, the
//! decoded file is written under the note id and the note's file fields are
//! filled in.
//!
//! The primary record is already persisted when this runs. A failure here
//! is reported to the caller but does not roll the primary record back.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::config::ServiceConfig;
use crate::core::error::{ArgumentError, RecordsResult};
use crate::core::field::FieldValue;
use crate::core::record::{AuditFlags, Record};
use crate::core::store::{AttachmentStore, RecordStore};

/// Attribute carrying the attachment's file name
pub const FILENAME_KEY: &str = "filename";
/// Attribute carrying the base64-encoded file contents
pub const FILECONTENTS_KEY: &str = "filecontents";

/// File companion of a create/update payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    pub filename: String,
    pub contents: String,
}

impl AttachmentPayload {
    /// Extract the payload; present iff the attributes contain `filename`
    ///
    /// A missing `filecontents` yields an empty file.
    pub fn from_attributes(attributes: &Map<String, Value>) -> RecordsResult<Option<Self>> {
        let Some(filename) = attributes.get(FILENAME_KEY) else {
            return Ok(None);
        };

        let filename = filename.as_str().ok_or_else(|| ArgumentError::InvalidValue {
            field: FILENAME_KEY.to_string(),
            message: "expected a string".to_string(),
        })?;

        let contents = match attributes.get(FILECONTENTS_KEY) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ArgumentError::InvalidValue {
                    field: FILECONTENTS_KEY.to_string(),
                    message: "expected a base64 string".to_string(),
                }
                .into());
            }
        };

        Ok(Some(Self {
            filename: filename.to_string(),
            contents,
        }))
    }
}

/// Is this attribute reserved for the attachment side channel?
pub fn is_attachment_key(key: &str) -> bool {
    key == FILENAME_KEY || key == FILECONTENTS_KEY
}

/// Text after the last dot, if any and non-empty
pub fn file_extension(filename: &str) -> Option<&str> {
    filename
        .rfind('.')
        .map(|pos| &filename[pos + 1..])
        .filter(|ext| !ext.is_empty())
}

/// Refuse names without an extension or with a denylisted one
pub fn validate_filename(config: &ServiceConfig, filename: &str) -> RecordsResult<()> {
    match file_extension(filename) {
        Some(ext) if !config.is_bad_extension(ext) => Ok(()),
        _ => Err(ArgumentError::InvalidExtension {
            filename: filename.to_string(),
        }
        .into()),
    }
}

/// Decode base64 contents, tolerating embedded line breaks
pub fn decode_contents(contents: &str) -> RecordsResult<Vec<u8>> {
    let compact: String = contents.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(compact.as_bytes()).map_err(|e| {
        ArgumentError::InvalidEncoding {
            message: e.to_string(),
        }
        .into()
    })
}

/// Media type of a written file: magic numbers first, then the file name
pub fn detect_mime_type(filename: &str, contents: &[u8]) -> String {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"PK\x03\x04", "application/zip"),
    ];

    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| contents.starts_with(sig)) {
        // Office documents are zip containers; the name is more precise.
        if *mime == "application/zip" {
            if let Some(guess) = mime_guess::from_path(filename).first() {
                return guess.essence_str().to_string();
            }
        }
        return mime.to_string();
    }

    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Runs the attachment side channel for one saved record
pub struct AttachmentWorkflow<'a> {
    pub config: &'a ServiceConfig,
    pub records: &'a dyn RecordStore,
    pub files: &'a dyn AttachmentStore,
}

impl AttachmentWorkflow<'_> {
    /// Attach `payload` to the note whose id equals `owner_id`
    pub async fn attach(
        &self,
        owner_id: &str,
        payload: &AttachmentPayload,
        actor: Option<&str>,
    ) -> RecordsResult<Record> {
        let module = &self.config.attachment_module;

        // Always a fresh load, never a copy held by the caller.
        let mut note = self.records.load_or_fail(module, owner_id).await?;
        let note_id = note.id_str().to_string();

        let contents = validate_filename(self.config, &payload.filename)
            .and_then(|_| decode_contents(&payload.contents))
            .inspect_err(|e| error!(note_id = %note_id, error = %e, "attachment rejected"))?;

        self.files
            .write(&note_id, &contents)
            .await
            .inspect_err(|e| error!(note_id = %note_id, error = %e, "attachment write failed"))?;

        let mime = detect_mime_type(&payload.filename, &contents);
        debug!(note_id = %note_id, mime = %mime, bytes = contents.len(), "attachment written");

        note.audit = AuditFlags::default();
        note.set("filename", FieldValue::String(payload.filename.clone()));
        note.set("uploadfile", FieldValue::String(payload.filename.clone()));
        note.set("file_mime_type", FieldValue::String(mime));
        self.records.persist(&mut note, actor).await?;

        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_payload_absent_without_filename() {
        let payload = AttachmentPayload::from_attributes(&attrs(json!({
            "name": "x",
            "filecontents": "aGk="
        })))
        .unwrap();
        assert!(payload.is_none());
    }

    #[test]
    fn test_payload_present_with_filename() {
        let payload = AttachmentPayload::from_attributes(&attrs(json!({
            "filename": "report.pdf",
            "filecontents": "aGk="
        })))
        .unwrap()
        .unwrap();
        assert_eq!(payload.filename, "report.pdf");
        assert_eq!(payload.contents, "aGk=");

        let empty = AttachmentPayload::from_attributes(&attrs(json!({"filename": "a.txt"})))
            .unwrap()
            .unwrap();
        assert!(empty.contents.is_empty());
    }

    #[test]
    fn test_payload_rejects_non_string_filename() {
        assert!(AttachmentPayload::from_attributes(&attrs(json!({"filename": 3}))).is_err());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("report.pdf"), Some("pdf"));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_validate_filename() {
        let config = ServiceConfig::default_config();
        assert!(validate_filename(&config, "report.pdf").is_ok());
        assert!(validate_filename(&config, "noext").is_err());
        assert!(validate_filename(&config, "shell.php").is_err());
        assert!(validate_filename(&config, "shell.PHP").is_err());
        assert!(validate_filename(&config, "trailing.").is_err());
    }

    #[test]
    fn test_decode_contents() {
        assert_eq!(decode_contents("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_contents("aGVs\nbG8=").unwrap(), b"hello");
        assert!(decode_contents("not base64!!").is_err());
    }

    #[test]
    fn test_detect_mime_type() {
        assert_eq!(detect_mime_type("x.bin", b"%PDF-1.7 ..."), "application/pdf");
        assert_eq!(detect_mime_type("notes.txt", b"hello"), "text/plain");
        assert_eq!(detect_mime_type("mystery", b"\x00\x01"), "application/octet-stream");
        assert_eq!(
            detect_mime_type("sheet.xlsx", b"PK\x03\x04rest"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }

    #[test]
    fn test_attachment_keys() {
        assert!(is_attachment_key("filename"));
        assert!(is_attachment_key("filecontents"));
        assert!(!is_attachment_key("name"));
    }
}
