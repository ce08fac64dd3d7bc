//! Reference-driven actions: delete, label, get.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_yaml::Value;

use kest_common::ResourceRef;

use crate::kubectl::{DeleteOptions, LabelOptions};
use crate::scenario::Deps;

use super::{fetch_verified, Action, Attempt};

/// Delete a resource by kind and name. One-way: deletion is its own end.
#[derive(Debug, Clone)]
pub struct Delete {
    pub target: ResourceRef,
}

#[async_trait]
impl Action for Delete {
    type Output = ();

    fn describe(&self) -> String {
        format!("Delete {} {}", self.target.kind, self.target.name)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        deps.kubectl
            .delete(
                &self.target.kubectl_type(),
                &self.target.name,
                DeleteOptions::default(),
                None,
            )
            .await?;
        Ok(Attempt::query(()))
    }
}

/// Add, update or remove labels on a resource. A `None` value removes
/// the label; `overwrite` allows changing an existing value.
#[derive(Debug, Clone)]
pub struct Label {
    pub target: ResourceRef,
    pub labels: BTreeMap<String, Option<String>>,
    pub overwrite: bool,
}

#[async_trait]
impl Action for Label {
    type Output = ();

    fn describe(&self) -> String {
        format!("Label {} {}", self.target.kind, self.target.name)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        deps.kubectl
            .label(
                &self.target.kubectl_type(),
                &self.target.name,
                &self.labels,
                LabelOptions {
                    overwrite: self.overwrite,
                },
                None,
            )
            .await?;
        Ok(Attempt::query(()))
    }
}

/// Fetch a resource and verify the response matches the reference.
#[derive(Debug, Clone)]
pub struct Get {
    pub target: ResourceRef,
}

#[async_trait]
impl Action for Get {
    type Output = Value;

    fn describe(&self) -> String {
        format!("Get {} {}", self.target.kind, self.target.name)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<Value>> {
        let value = fetch_verified(&deps.kubectl, &self.target).await?;
        Ok(Attempt::query(value))
    }
}
