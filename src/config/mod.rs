//! Configuration loading and management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::core::auth::AuthPolicy;
use crate::core::error::ConfigError;
use crate::core::field::FieldType;
use crate::core::module::{ModuleAcl, ModuleDefinition, ModuleRegistry};

/// Complete configuration of the record service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    /// Scheme and host prefixed to pagination links (e.g. "https://crm.example.com")
    #[validate(url)]
    pub base_url: String,

    /// Directory attachments are written to, one file per note id
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Attachment extensions that are refused (compared case-insensitively)
    #[serde(default = "default_upload_badext")]
    pub upload_badext: Vec<String>,

    /// Largest number of rows a single list query may return
    #[serde(default = "default_max_limit")]
    #[validate(range(min = 1))]
    pub max_limit: u64,

    /// `page[size]` value meaning "return all records"
    #[serde(default = "default_all_records_size")]
    #[validate(range(max = -1))]
    pub all_records_size: i64,

    /// Module whose records carry file attachments
    #[serde(default = "default_attachment_module")]
    #[validate(length(min = 1))]
    pub attachment_module: String,

    /// Module schemas
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("upload")
}

fn default_upload_badext() -> Vec<String> {
    [
        "php", "php3", "php4", "php5", "pl", "cgi", "py", "asp", "cfm", "js", "vbs", "html",
        "htm", "phtml", "phar",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_limit() -> u64 {
    1000
}

fn default_all_records_size() -> i64 {
    -99
}

fn default_attachment_module() -> String {
    "Notes".to_string()
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Validate field constraints and cross-field consistency
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        for module in &self.modules {
            let acl = &module.acl;
            let field_policies = module
                .fields
                .iter()
                .filter_map(|f| f.read.as_deref().map(|p| (f.name.as_str(), p)));
            for (name, policy) in [
                ("view", acl.view.as_str()),
                ("save", acl.save.as_str()),
                ("delete", acl.delete.as_str()),
            ]
            .into_iter()
            .chain(field_policies)
            {
                if AuthPolicy::try_parse_policy(policy).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "unknown policy '{}' for '{}' in module {}",
                        policy, name, module.name
                    )));
                }
            }

            for field in &module.default_fields {
                if !module.declares(field) {
                    return Err(ConfigError::Invalid(format!(
                        "default field '{}' is not declared by module {}",
                        field, module.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Is this extension refused for attachments?
    pub fn is_bad_extension(&self, extension: &str) -> bool {
        self.upload_badext
            .iter()
            .any(|bad| bad.eq_ignore_ascii_case(extension))
    }

    /// Build the module registry from the declared schemas
    pub fn registry(&self) -> ModuleRegistry {
        ModuleRegistry::from_definitions(self.modules.iter().cloned())
    }

    /// Create a default configuration for testing and demos
    pub fn default_config() -> Self {
        let mut accounts = ModuleDefinition::new("Accounts")
            .with_field("name", FieldType::String)
            .with_field("industry", FieldType::String)
            .with_field("employees", FieldType::Integer)
            .with_field("annual_revenue", FieldType::String)
            .with_field("description", FieldType::String)
            .with_relationship("contacts")
            .with_relationship("notes");
        accounts.object_name = Some("Account".to_string());
        accounts.fields[3].read = Some("role:finance".to_string());

        let mut contacts = ModuleDefinition::new("Contacts")
            .with_field("first_name", FieldType::String)
            .with_field("last_name", FieldType::String)
            .with_field("email1", FieldType::String)
            .with_field("do_not_call", FieldType::Boolean)
            .with_relationship("accounts");
        contacts.object_name = Some("Contact".to_string());

        let mut notes = ModuleDefinition::new("Notes")
            .with_field("name", FieldType::String)
            .with_field("description", FieldType::String)
            .with_field("filename", FieldType::String)
            .with_field("uploadfile", FieldType::String)
            .with_field("file_mime_type", FieldType::String)
            .with_field("parent_type", FieldType::String)
            .with_field("parent_id", FieldType::String)
            .with_acl(ModuleAcl {
                view: "authenticated".to_string(),
                save: "authenticated".to_string(),
                delete: "admin_only|role:manager".to_string(),
            });
        notes.object_name = Some("Note".to_string());

        Self {
            base_url: "http://localhost:8080".to_string(),
            upload_dir: default_upload_dir(),
            upload_badext: default_upload_badext(),
            max_limit: default_max_limit(),
            all_records_size: default_all_records_size(),
            attachment_module: default_attachment_module(),
            modules: vec![accounts, contacts, notes],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default_config();

        assert_eq!(config.modules.len(), 3);
        assert!(config.check().is_ok());
        assert!(config.registry().get("Notes").is_ok());
    }

    #[test]
    fn test_yaml_serialization() {
        let config = ServiceConfig::default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();

        // Should be able to parse it back
        let parsed = ServiceConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.modules.len(), config.modules.len());
        assert_eq!(parsed.max_limit, config.max_limit);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = ServiceConfig::from_yaml_str(
            "base_url: https://crm.example.com\nmodules:\n  - name: Leads\n",
        )
        .unwrap();
        assert_eq!(config.all_records_size, -99);
        assert_eq!(config.attachment_module, "Notes");
        assert!(config.is_bad_extension("PHP"));
        assert!(!config.is_bad_extension("pdf"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ServiceConfig::from_yaml_str("base_url: not a url\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ServiceConfig::from_yaml_str(
            "base_url: http://x.io\nall_records_size: 5\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_undeclared_default_field_rejected() {
        let err = ServiceConfig::from_yaml_str(
            "base_url: http://x.io\nmodules:\n  - name: Leads\n    default_fields: [nope]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = ServiceConfig::from_yaml_str(
            "base_url: http://x.io\nmodules:\n  - name: Leads\n    acl:\n      delete: admin_onyl\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("admin_onyl"));

        let err = ServiceConfig::from_yaml_str(
            "base_url: http://x.io\nmodules:\n  - name: Leads\n    fields:\n      - name: salary\n        read: 'role:'\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("salary"));

        assert!(
            ServiceConfig::from_yaml_str(
                "base_url: http://x.io\nmodules:\n  - name: Leads\n    acl:\n      delete: role:manager|admin_only\n",
            )
            .is_ok()
        );
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
