//! Namespace creation with generated names.

use async_trait::async_trait;
use serde_yaml::Value;
use tracing::debug;

use kest_common::{generated_name, Manifest, NAMESPACE_PREFIX};

use crate::kubectl::is_already_exists;
use crate::scenario::Deps;

use super::{Action, Attempt, Revert};

/// How a namespace action picks its name.
#[derive(Debug, Clone, Default)]
pub enum NamespaceInput {
    /// Generate `kest-<suffix>`.
    #[default]
    Generated,
    /// Use this exact name.
    Name(String),
    /// Generate `<prefix><suffix>`.
    GenerateName(String),
}

impl NamespaceInput {
    /// The name for one attempt. Generated variants draw a fresh suffix
    /// every call, which is what makes collision retries converge.
    fn next_name(&self) -> String {
        match self {
            NamespaceInput::Generated => generated_name(NAMESPACE_PREFIX),
            NamespaceInput::Name(name) => name.clone(),
            NamespaceInput::GenerateName(prefix) => generated_name(prefix),
        }
    }

    fn describe(&self, verb: &str) -> String {
        match self {
            NamespaceInput::Name(name) => format!("{verb} Namespace {name}"),
            NamespaceInput::Generated | NamespaceInput::GenerateName(_) => {
                format!("{verb} Namespace")
            }
        }
    }
}

impl From<&str> for NamespaceInput {
    fn from(name: &str) -> Self {
        NamespaceInput::Name(name.to_string())
    }
}

impl From<String> for NamespaceInput {
    fn from(name: String) -> Self {
        NamespaceInput::Name(name)
    }
}

impl From<()> for NamespaceInput {
    fn from(_: ()) -> Self {
        NamespaceInput::Generated
    }
}

fn namespace_manifest(name: &str) -> anyhow::Result<Manifest> {
    let value: Value = serde_yaml::from_str(&format!(
        "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: {name}\n"
    ))?;
    Ok(Manifest::parse(value)?)
}

/// Create a namespace via server-side apply. Reverts by deleting it.
#[derive(Debug, Clone)]
pub struct ApplyNamespace {
    pub input: NamespaceInput,
}

#[async_trait]
impl Action for ApplyNamespace {
    type Output = String;

    fn describe(&self) -> String {
        self.input.describe("Apply")
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<String>> {
        let name = self.input.next_name();
        let manifest = namespace_manifest(&name)?;
        deps.kubectl.apply(&manifest, None).await?;
        Ok(Attempt::mutate(
            name,
            Revert::delete(deps.kubectl.clone(), manifest.to_ref()),
        ))
    }
}

/// Create a namespace via plain create, failing on an existing name.
/// Generated names draw a fresh suffix each attempt, so a collision is
/// resolved by the surrounding retry.
#[derive(Debug, Clone)]
pub struct CreateNamespace {
    pub input: NamespaceInput,
}

#[async_trait]
impl Action for CreateNamespace {
    type Output = String;

    fn describe(&self) -> String {
        self.input.describe("Create")
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<String>> {
        let name = self.input.next_name();
        let manifest = namespace_manifest(&name)?;
        if let Err(err) = deps.kubectl.create(&manifest, None).await {
            if is_already_exists(&err) {
                debug!(namespace = %name, "generated namespace name collided");
            }
            return Err(err);
        }
        Ok(Attempt::mutate(
            name,
            Revert::delete(deps.kubectl.clone(), manifest.to_ref()),
        ))
    }
}
