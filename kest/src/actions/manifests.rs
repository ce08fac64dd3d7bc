//! Manifest-driven mutating actions: apply, create, status apply.

use async_trait::async_trait;

use kest_common::Manifest;

use crate::scenario::Deps;

use super::{Action, Attempt, Revert};

/// Server-side apply of a manifest. Reverts by deleting kind + name.
#[derive(Debug, Clone)]
pub struct Apply {
    pub manifest: Manifest,
}

#[async_trait]
impl Action for Apply {
    type Output = ();

    fn describe(&self) -> String {
        format!("Apply {} {}", self.manifest.kind(), self.manifest.name())
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        deps.kubectl.apply(&self.manifest, None).await?;
        Ok(Attempt::mutate(
            (),
            Revert::delete(deps.kubectl.clone(), self.manifest.to_ref()),
        ))
    }
}

/// Create a resource; fails when it already exists. Reverts like apply.
#[derive(Debug, Clone)]
pub struct Create {
    pub manifest: Manifest,
}

#[async_trait]
impl Action for Create {
    type Output = ();

    fn describe(&self) -> String {
        format!("Create {} {}", self.manifest.kind(), self.manifest.name())
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        deps.kubectl.create(&self.manifest, None).await?;
        Ok(Attempt::mutate(
            (),
            Revert::delete(deps.kubectl.clone(), self.manifest.to_ref()),
        ))
    }
}

/// Server-side apply against the status subresource. One-way: status
/// writes are not undone at cleanup.
#[derive(Debug, Clone)]
pub struct ApplyStatus {
    pub manifest: Manifest,
}

#[async_trait]
impl Action for ApplyStatus {
    type Output = ();

    fn describe(&self) -> String {
        format!(
            "Apply status of {} {}",
            self.manifest.kind(),
            self.manifest.name()
        )
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        deps.kubectl.apply_status(&self.manifest, None).await?;
        Ok(Attempt::query(()))
    }
}
