//! The action taxonomy: every observable step a scenario can take.
//!
//! An action is a description plus a single-attempt body. The scenario
//! runtime brackets it with `ActionStart`/`ActionEnd`, drives the body
//! through the retry engine, and registers the revert a successful
//! mutating attempt hands back. Three kinds exist:
//!
//! - *mutate* — changes cluster state, returns a revert
//! - *one-way mutate* — changes cluster state, nothing to revert
//! - *query* — reads cluster state
//!
//! The kinds differ only in whether [`Attempt::revert`] is populated.

mod asserts;
mod exec;
mod manifests;
mod namespace;
mod resources;

pub use asserts::{
    Assert, AssertAbsence, AssertApplyError, AssertCreateError, AssertList, AssertOne,
};
pub use exec::Exec;
pub use manifests::{Apply, ApplyStatus, Create};
pub use namespace::{ApplyNamespace, CreateNamespace, NamespaceInput};
pub use resources::{Delete, Get, Label};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_yaml::Value;

use kest_common::ResourceRef;

use crate::kubectl::{ClusterClient, DeleteOptions};
use crate::reverting::RevertFn;
use crate::scenario::Deps;

/// User assertion over a fetched resource document.
pub type AssertFn = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// User assertion over a fetched resource list.
pub type ListAssertFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<()> + Send + Sync>;

/// User assertion over an expected error.
pub type ErrorAssertFn = Arc<dyn Fn(&anyhow::Error) -> anyhow::Result<()> + Send + Sync>;

/// Filter predicate for list-based assertions.
pub type WhereFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Result of one successful action attempt.
pub struct Attempt<T> {
    pub output: T,
    pub revert: Option<Revert>,
}

impl<T> Attempt<T> {
    pub fn query(output: T) -> Self {
        Self {
            output,
            revert: None,
        }
    }

    pub fn mutate(output: T, revert: Revert) -> Self {
        Self {
            output,
            revert: Some(revert),
        }
    }
}

/// A named, re-callable cleanup step produced by a mutating attempt.
pub struct Revert {
    pub description: String,
    pub run: RevertFn,
}

impl Revert {
    pub fn new<F, Fut>(description: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            description: description.into(),
            run: Arc::new(move || -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
                Box::pin(run())
            }),
        }
    }

    /// The standard revert for created resources: delete by kind and
    /// name, tolerating a resource that is already gone.
    pub fn delete(client: Arc<dyn ClusterClient>, target: ResourceRef) -> Self {
        let description = format!("Delete {} {}", target.kind, target.name);
        Revert::new(description, move || {
            let client = client.clone();
            let target = target.clone();
            async move {
                client
                    .delete(
                        &target.kubectl_type(),
                        &target.name,
                        DeleteOptions {
                            ignore_not_found: true,
                        },
                        None,
                    )
                    .await?;
                Ok(())
            }
        })
    }

    pub fn noop(description: impl Into<String>) -> Self {
        Revert::new(description, || async { Ok(()) })
    }
}

impl std::fmt::Debug for Revert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Revert")
            .field("description", &self.description)
            .finish()
    }
}

/// One scenario step: a description and a retryable single attempt.
#[async_trait]
pub trait Action: Send + Sync {
    type Output: Send;

    /// Human-readable name used in events and the report.
    fn describe(&self) -> String;

    /// Run one attempt against the cluster.
    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<Self::Output>>;
}

/// Fetch a resource and verify it matches the reference it was fetched by.
pub(crate) async fn fetch_verified(
    client: &Arc<dyn ClusterClient>,
    target: &ResourceRef,
) -> anyhow::Result<Value> {
    let yaml = client.get(&target.kubectl_type(), &target.name, None).await?;
    let value: Value = serde_yaml::from_str(&yaml)
        .map_err(|err| anyhow::anyhow!("cluster returned unparseable YAML: {err}"))?;

    let api_version = value.get("apiVersion").and_then(Value::as_str).unwrap_or("");
    let kind = value.get("kind").and_then(Value::as_str).unwrap_or("");
    let name = value
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("");

    if api_version != target.api_version || kind != target.kind || name != target.name {
        anyhow::bail!(
            "fetched resource {api_version}/{kind} {name:?} does not match requested {} {} {:?}",
            target.api_version,
            target.kind,
            target.name,
        );
    }
    Ok(value)
}
