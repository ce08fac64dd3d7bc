//! Observing actions: assertions against fetched state and expected
//! errors. All of these are queries except the expected-error pair,
//! which may transiently create the resource it expected to be refused.

use async_trait::async_trait;
use serde_yaml::Value;
use tracing::warn;

use kest_common::{Manifest, ResourceRef};

use crate::kubectl::{is_not_found, DeleteOptions};
use crate::scenario::Deps;

use super::{fetch_verified, Action, AssertFn, Attempt, ErrorAssertFn, ListAssertFn, WhereFn};

/// Fetch a resource and run a user assertion against it. A failing
/// assertion is retried like any other cluster read.
pub struct Assert {
    pub target: ResourceRef,
    pub test: AssertFn,
}

#[async_trait]
impl Action for Assert {
    type Output = ();

    fn describe(&self) -> String {
        format!("Assert {} {}", self.target.kind, self.target.name)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        let value = fetch_verified(&deps.kubectl, &self.target).await?;
        (self.test)(&value)?;
        Ok(Attempt::query(()))
    }
}

/// Succeeds only when the fetch fails with the cluster's "not found"
/// signal; a resource that is present (or any other error) fails.
#[derive(Debug, Clone)]
pub struct AssertAbsence {
    pub target: ResourceRef,
}

#[async_trait]
impl Action for AssertAbsence {
    type Output = ();

    fn describe(&self) -> String {
        format!("Assert absence of {} {}", self.target.kind, self.target.name)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        match deps
            .kubectl
            .get(&self.target.kubectl_type(), &self.target.name, None)
            .await
        {
            Ok(_) => anyhow::bail!(
                "expected {} {} to be absent, but it exists",
                self.target.kind,
                self.target.name
            ),
            Err(err) if is_not_found(&err) => Ok(Attempt::query(())),
            Err(err) => Err(err),
        }
    }
}

/// List all resources of a kind and run a user assertion on the items.
pub struct AssertList {
    pub api_version: String,
    pub kind: String,
    pub test: ListAssertFn,
}

#[async_trait]
impl Action for AssertList {
    type Output = ();

    fn describe(&self) -> String {
        format!("Assert list of {}", self.kind)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        let items = list_items(deps, &self.api_version, &self.kind).await?;
        (self.test)(&items)?;
        Ok(Attempt::query(()))
    }
}

/// List, optionally filter, require exactly one match, and assert on it.
pub struct AssertOne {
    pub api_version: String,
    pub kind: String,
    pub filter: Option<WhereFn>,
    pub test: AssertFn,
}

#[async_trait]
impl Action for AssertOne {
    type Output = ();

    fn describe(&self) -> String {
        format!("Assert one {}", self.kind)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        let items = list_items(deps, &self.api_version, &self.kind).await?;
        let matched: Vec<&Value> = match &self.filter {
            Some(filter) => items.iter().filter(|item| filter(item)).collect(),
            None => items.iter().collect(),
        };
        match matched.as_slice() {
            [one] => {
                (self.test)(one)?;
                Ok(Attempt::query(()))
            }
            [] => anyhow::bail!("expected exactly one {}, found none", self.kind),
            many => anyhow::bail!(
                "expected exactly one {}, found {}",
                self.kind,
                many.len()
            ),
        }
    }
}

async fn list_items(deps: &Deps, api_version: &str, kind: &str) -> anyhow::Result<Vec<Value>> {
    let type_name = kest_common::kubectl_type(api_version, kind);
    let yaml = deps.kubectl.list(&type_name, None).await?;
    let value: Value = serde_yaml::from_str(&yaml)
        .map_err(|err| anyhow::anyhow!("cluster returned unparseable YAML: {err}"))?;

    let items = match value.get("items") {
        Some(Value::Sequence(items)) => items.clone(),
        _ => Vec::new(),
    };
    for item in &items {
        let item_kind = item.get("kind").and_then(Value::as_str).unwrap_or("");
        if item_kind != kind {
            anyhow::bail!("list of {kind} contained a {item_kind}");
        }
    }
    Ok(items)
}

/// Expect a server-side apply to be refused and assert on the refusal.
///
/// When the apply is unexpectedly admitted, the resource is deleted on
/// the spot and the attempt fails — which sends it back through the
/// retry engine, covering admission webhooks that need a moment to come
/// up. The expected-error path leaves nothing behind, so no revert is
/// ever registered.
pub struct AssertApplyError {
    pub manifest: Manifest,
    pub test: ErrorAssertFn,
}

#[async_trait]
impl Action for AssertApplyError {
    type Output = ();

    fn describe(&self) -> String {
        format!(
            "Assert apply error of {} {}",
            self.manifest.kind(),
            self.manifest.name()
        )
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        match deps.kubectl.apply(&self.manifest, None).await {
            Ok(_) => {
                undo_unexpected_success(deps, &self.manifest).await;
                anyhow::bail!(
                    "expected apply of {} {} to fail, but it succeeded",
                    self.manifest.kind(),
                    self.manifest.name()
                )
            }
            Err(err) => {
                (self.test)(&err)?;
                Ok(Attempt::query(()))
            }
        }
    }
}

/// Like [`AssertApplyError`] for plain create.
pub struct AssertCreateError {
    pub manifest: Manifest,
    pub test: ErrorAssertFn,
}

#[async_trait]
impl Action for AssertCreateError {
    type Output = ();

    fn describe(&self) -> String {
        format!(
            "Assert create error of {} {}",
            self.manifest.kind(),
            self.manifest.name()
        )
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        match deps.kubectl.create(&self.manifest, None).await {
            Ok(_) => {
                undo_unexpected_success(deps, &self.manifest).await;
                anyhow::bail!(
                    "expected create of {} {} to fail, but it succeeded",
                    self.manifest.kind(),
                    self.manifest.name()
                )
            }
            Err(err) => {
                (self.test)(&err)?;
                Ok(Attempt::query(()))
            }
        }
    }
}

async fn undo_unexpected_success(deps: &Deps, manifest: &Manifest) {
    let result = deps
        .kubectl
        .delete(
            &manifest.kubectl_type(),
            manifest.name(),
            DeleteOptions {
                ignore_not_found: true,
            },
            None,
        )
        .await;
    if let Err(err) = result {
        warn!(
            "failed to undo unexpectedly admitted {} {}: {err:#}",
            manifest.kind(),
            manifest.name()
        );
    }
}
