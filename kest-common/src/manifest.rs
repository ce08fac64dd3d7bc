//! Manifest parsing and kubectl type names.
//!
//! The engine accepts manifests as YAML text or as already-built YAML/JSON
//! values; either way they validate down to a [`Manifest`] carrying the
//! three fields every action needs: `apiVersion`, `kind` and
//! `metadata.name`.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

/// A manifest failed to parse or validate.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("manifest must be a mapping, got {kind}")]
    NotAMapping { kind: &'static str },

    #[error("manifest is missing required fields: {}", missing.join(", "))]
    MissingFields { missing: Vec<String> },
}

/// Input variants accepted by every manifest-taking action.
#[derive(Debug, Clone)]
pub enum ManifestSource {
    /// A YAML document as text.
    Yaml(String),
    /// An already-parsed YAML value.
    Value(Value),
}

impl From<&str> for ManifestSource {
    fn from(yaml: &str) -> Self {
        Self::Yaml(yaml.to_string())
    }
}

impl From<String> for ManifestSource {
    fn from(yaml: String) -> Self {
        Self::Yaml(yaml)
    }
}

impl From<Value> for ManifestSource {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<serde_json::Value> for ManifestSource {
    fn from(value: serde_json::Value) -> Self {
        // JSON is a subset of YAML; the mapping cannot fail.
        Self::Value(serde_yaml::to_value(value).unwrap_or(Value::Null))
    }
}

/// A validated Kubernetes resource manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    api_version: String,
    kind: String,
    name: String,
    value: Value,
}

impl Manifest {
    /// Parse and validate a manifest from any accepted source.
    pub fn parse(source: impl Into<ManifestSource>) -> Result<Self, ManifestError> {
        let value = match source.into() {
            ManifestSource::Yaml(text) => serde_yaml::from_str::<Value>(&text)?,
            ManifestSource::Value(value) => value,
        };

        let mapping = match &value {
            Value::Mapping(_) => &value,
            other => {
                return Err(ManifestError::NotAMapping {
                    kind: yaml_kind(other),
                })
            }
        };

        let mut missing = Vec::new();
        let api_version = non_empty_string(mapping.get("apiVersion"));
        if api_version.is_none() {
            missing.push("apiVersion".to_string());
        }
        let kind = non_empty_string(mapping.get("kind"));
        if kind.is_none() {
            missing.push("kind".to_string());
        }
        let name = non_empty_string(mapping.get("metadata").and_then(|m| m.get("name")));
        if name.is_none() {
            missing.push("metadata.name".to_string());
        }
        if !missing.is_empty() {
            return Err(ManifestError::MissingFields { missing });
        }

        Ok(Self {
            api_version: api_version.unwrap_or_default(),
            kind: kind.unwrap_or_default(),
            name: name.unwrap_or_default(),
            value,
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether the manifest carries a `status` section (required by the
    /// status-subresource apply).
    pub fn has_status(&self) -> bool {
        self.value.get("status").is_some()
    }

    /// The kubectl type name identifying this manifest's kind.
    pub fn kubectl_type(&self) -> String {
        kubectl_type(&self.api_version, &self.kind)
    }

    /// Reference to this manifest's kind and name.
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
        }
    }

    /// Serialize back to a YAML document for piping into kubectl.
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        Ok(serde_yaml::to_string(&self.value)?)
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Reference to a resource by kind and name, without a full manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn kubectl_type(&self) -> String {
        kubectl_type(&self.api_version, &self.kind)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Derive the kubectl type name from `apiVersion` and `kind`.
///
/// Core-group resources (`apiVersion: v1`) use the bare kind; everything
/// else uses `<kind>.<version>.<group>`, which uniquely identifies the
/// kind to kubectl even across CRDs sharing a kind name.
pub fn kubectl_type(api_version: &str, kind: &str) -> String {
    match api_version.split_once('/') {
        None => kind.to_string(),
        Some((group, version)) => format!("{kind}.{version}.{group}"),
    }
}
