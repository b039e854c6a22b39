use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;

use crate::hooks::HookName;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ManifestError {
    #[error("Malformed manifest: {0}")]
    Malformed(String),

    #[error("Invalid slug '{0}': use lowercase letters, digits, '-' or '_'")]
    InvalidSlug(String),

    #[error("Manifest slug '{manifest}' does not match module '{instance}'")]
    SlugMismatch { manifest: String, instance: String },

    #[error("Field #{index} has an empty name")]
    EmptyFieldName { index: usize },

    #[error("Duplicate field '{0}'")]
    DuplicateField(String),

    #[error("Select field '{0}' needs at least one option")]
    MissingOptions(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Boolean,
    Date,
    Email,
    Phone,
    Select,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Filled in by the before-save hook when the field is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub path: String,
    pub label: String,
}

fn default_icon() -> String {
    "puzzle".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_priority() -> i32 {
    50
}

/// Declarative description of a module. Immutable once loaded; an update
/// replaces the whole manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub slug: String,
    pub name: String,
    pub version: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    #[serde(default)]
    pub hooks: Vec<HookName>,
    /// Hook priority for this module's declarative handlers, lower runs first
    #[serde(default = "default_priority")]
    pub priority: i32,
}

impl ModuleManifest {
    /// Parses and validates a stored manifest
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        let manifest: Self =
            serde_json::from_value(value).map_err(|e| ManifestError::Malformed(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        let slug_ok = !self.slug.is_empty()
            && self
                .slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !slug_ok {
            return Err(ManifestError::InvalidSlug(self.slug.clone()));
        }

        let mut seen = HashSet::new();
        for (index, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(ManifestError::EmptyFieldName { index });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ManifestError::DuplicateField(field.name.clone()));
            }
            if field.field_type == FieldType::Select && field.options.is_empty() {
                return Err(ManifestError::MissingOptions(field.name.clone()));
            }
        }

        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn participates_in(&self, hook: HookName) -> bool {
        self.hooks.contains(&hook)
    }

    /// Route the sidebar links to: the first declared route, else the generic module page
    pub fn entry_route(&self) -> String {
        self.routes
            .first()
            .map(|r| r.path.clone())
            .unwrap_or_else(|| format!("/dashboard/modules/{}", self.slug))
    }

    /// Content hash used to tell whether a reload replaced the manifest
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }
}
