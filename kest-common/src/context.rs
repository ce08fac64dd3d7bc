//! Cluster context records layered onto every client call.

use serde::{Deserialize, Serialize};

/// Immutable per-call settings for the cluster client.
///
/// A scenario carries a default context; namespaced and cluster-bound views
/// carry overrides. Contexts combine by field-wise override, the overlay
/// winning wherever it is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_manager_name: Option<String>,
}

impl ClusterContext {
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<String>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_field_manager(mut self, name: impl Into<String>) -> Self {
        self.field_manager_name = Some(name.into());
        self
    }

    /// Combine with an overlay; the overlay's set fields win.
    pub fn layer(&self, over: &ClusterContext) -> ClusterContext {
        ClusterContext {
            namespace: over.namespace.clone().or_else(|| self.namespace.clone()),
            kubeconfig: over.kubeconfig.clone().or_else(|| self.kubeconfig.clone()),
            context: over.context.clone().or_else(|| self.context.clone()),
            field_manager_name: over
                .field_manager_name
                .clone()
                .or_else(|| self.field_manager_name.clone()),
        }
    }
}
