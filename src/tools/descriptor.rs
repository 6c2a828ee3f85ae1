//! Tool descriptor and UI schema documents
//!
//! Both are read from YAML inside a tool package and passed through to
//! callers untouched. The core only relies on `ToolDescriptor::id`.

use crate::error::DiscoveryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Static metadata describing a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique, stable key
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Form description rendered by a presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSchema {
    #[serde(default)]
    pub components: Vec<UiComponent>,
}

/// A single input or display component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiComponent {
    /// Component type (e.g. "textarea", "select")
    #[serde(rename = "type")]
    pub component_type: String,
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl ToolDescriptor {
    /// Read and validate a descriptor file
    pub fn from_file(path: &Path) -> Result<Self, DiscoveryError> {
        let descriptor: ToolDescriptor = read_yaml(path)?;
        if descriptor.id.trim().is_empty() {
            return Err(DiscoveryError::InvalidDescriptor {
                path: path.to_path_buf(),
                reason: "id must not be empty".to_string(),
            });
        }
        Ok(descriptor)
    }
}

impl UiSchema {
    /// Read a UI schema file
    pub fn from_file(path: &Path) -> Result<Self, DiscoveryError> {
        read_yaml(path)
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DiscoveryError> {
    let contents = fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&contents).map_err(|source| DiscoveryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_descriptor() {
        let yaml = r#"
id: case-transform
name: Case Transform
description: Changes the case of text
version: 1.0.0
author: Tools Team
tags:
  - text
  - formatting
"#;
        let descriptor: ToolDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.id, "case-transform");
        assert_eq!(descriptor.version, "1.0.0");
        assert_eq!(descriptor.tags, vec!["text", "formatting"]);
    }

    #[test]
    fn test_descriptor_optional_fields_default() {
        let descriptor: ToolDescriptor = serde_yaml::from_str("id: bare").unwrap();
        assert_eq!(descriptor.name, "");
        assert!(descriptor.tags.is_empty());
    }

    #[test]
    fn test_descriptor_without_id_fails() {
        let result: Result<ToolDescriptor, _> = serde_yaml::from_str("name: Nameless");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file_rejects_blank_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.yaml");
        fs::write(&path, "id: \"  \"\nname: Blank\n").unwrap();

        let result = ToolDescriptor::from_file(&path);
        assert!(matches!(result, Err(DiscoveryError::InvalidDescriptor { .. })));
    }

    #[test]
    fn test_parse_ui_schema() {
        let yaml = r#"
components:
  - type: textarea
    id: inputText
    label: Input Text
    placeholder: Enter text to transform
    required: true
  - type: select
    id: transformationType
    label: Transformation
    defaultValue: uppercase
    options:
      uppercase: UPPERCASE
      lowercase: lowercase
"#;
        let schema: UiSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.components.len(), 2);

        let first = &schema.components[0];
        assert_eq!(first.component_type, "textarea");
        assert!(first.required);
        assert!(first.default_value.is_none());

        let second = &schema.components[1];
        assert!(!second.required);
        assert_eq!(second.default_value, Some(serde_json::json!("uppercase")));
        assert_eq!(second.options.len(), 2);
    }

    #[test]
    fn test_ui_schema_serializes_camel_case() {
        let component = UiComponent {
            component_type: "text".to_string(),
            id: "name".to_string(),
            label: "Name".to_string(),
            placeholder: None,
            required: false,
            default_value: Some(serde_json::json!("anon")),
            options: BTreeMap::new(),
        };
        let json = serde_json::to_value(&component).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["defaultValue"], "anon");
        assert!(json.get("placeholder").is_none());
    }
}
