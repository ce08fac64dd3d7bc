//! The scenario runtime: composes actions into a stateful run.
//!
//! A [`Scenario`] owns the recorder, the cluster client and the reverting
//! stack for one test run. Every public verb wraps an action in the same
//! pattern: record `ActionStart`, drive the body through the retry
//! engine, push the revert a successful mutating attempt produced, and
//! record `ActionEnd`. Failing actions propagate their error to the
//! scenario body; cleanup still runs.
//!
//! Namespaced and cluster-bound views derive from a scenario by layering
//! a context overlay onto the client. Views share the recorder and the
//! reverting stack with their parent; ownership stays a tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_yaml::Value;

use kest_common::{
    ClusterContext, DurationMs, ErrorSummary, Event, Manifest, ManifestSource, ResourceRef,
};

use crate::actions::{
    Action, Apply, ApplyNamespace, ApplyStatus, Assert, AssertAbsence, AssertApplyError,
    AssertCreateError, AssertList, AssertOne, Create, CreateNamespace, Delete, Exec, Get, Label,
    NamespaceInput, Revert,
};
use crate::kubectl::ClusterClient;
use crate::recorder::Recorder;
use crate::retry::{retry_until, RetryOptions};
use crate::reverting::Reverting;
use crate::shell::Shell;

/// Everything an action needs to run.
#[derive(Clone)]
pub struct Deps {
    pub recorder: Recorder,
    pub kubectl: Arc<dyn ClusterClient>,
    pub reverting: Reverting,
    pub shell: Shell,
}

/// Reference to another cluster for [`Scenario::use_cluster`].
#[derive(Debug, Clone, Default)]
pub struct ClusterRef {
    pub context: Option<String>,
    pub kubeconfig: Option<String>,
}

/// One run of the test DSL: a linear sequence of actions plus cleanup.
#[derive(Clone)]
pub struct Scenario {
    name: String,
    deps: Deps,
    options: RetryOptions,
}

impl Scenario {
    /// Build a scenario over the given dependencies. The caller (normally
    /// the scenario runner) records `ScenarioStart`/`ScenarioEnd` and
    /// drains the reverting stack when the body is done.
    pub fn new(name: impl Into<String>, deps: Deps) -> Self {
        Self {
            name: name.into(),
            deps,
            options: RetryOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    /// A view whose actions run with different retry options.
    pub fn with_options(&self, options: RetryOptions) -> Scenario {
        Scenario {
            options,
            ..self.clone()
        }
    }

    // ---------------------------------------------------------------------
    // BDD annotations: report structure only, no execution effect.
    // ---------------------------------------------------------------------

    pub fn given(&self, description: impl Into<String>) {
        self.deps.recorder.record(Event::BddGiven {
            description: description.into(),
        });
    }

    pub fn when(&self, description: impl Into<String>) {
        self.deps.recorder.record(Event::BddWhen {
            description: description.into(),
        });
    }

    pub fn then(&self, description: impl Into<String>) {
        self.deps.recorder.record(Event::BddThen {
            description: description.into(),
        });
    }

    pub fn and(&self, description: impl Into<String>) {
        self.deps.recorder.record(Event::BddAnd {
            description: description.into(),
        });
    }

    pub fn but(&self, description: impl Into<String>) {
        self.deps.recorder.record(Event::BddBut {
            description: description.into(),
        });
    }

    // ---------------------------------------------------------------------
    // Mutating verbs
    // ---------------------------------------------------------------------

    /// Server-side apply. Registers a delete of the resource as revert.
    pub async fn apply(&self, manifest: impl Into<ManifestSource>) -> anyhow::Result<Manifest> {
        let manifest = Manifest::parse(manifest)?;
        self.run_action(Apply {
            manifest: manifest.clone(),
        })
        .await?;
        Ok(manifest)
    }

    /// Create; fails when the resource already exists.
    pub async fn create(&self, manifest: impl Into<ManifestSource>) -> anyhow::Result<Manifest> {
        let manifest = Manifest::parse(manifest)?;
        self.run_action(Create {
            manifest: manifest.clone(),
        })
        .await?;
        Ok(manifest)
    }

    /// Create a namespace via apply and register its deletion.
    pub async fn apply_namespace(
        &self,
        input: impl Into<NamespaceInput>,
    ) -> anyhow::Result<String> {
        self.run_action(ApplyNamespace {
            input: input.into(),
        })
        .await
    }

    /// Create a namespace via create; generated names retry on collision.
    pub async fn create_namespace(
        &self,
        input: impl Into<NamespaceInput>,
    ) -> anyhow::Result<String> {
        self.run_action(CreateNamespace {
            input: input.into(),
        })
        .await
    }

    /// Run user code under the shell adapter; see [`Exec`].
    pub async fn exec(&self, exec: Exec) -> anyhow::Result<()> {
        self.run_action(exec).await
    }

    // ---------------------------------------------------------------------
    // One-way mutating verbs
    // ---------------------------------------------------------------------

    /// Server-side apply against the status subresource.
    pub async fn apply_status(&self, manifest: impl Into<ManifestSource>) -> anyhow::Result<()> {
        let manifest = Manifest::parse(manifest)?;
        if !manifest.has_status() {
            anyhow::bail!(
                "manifest for a status apply must include a status section ({} {})",
                manifest.kind(),
                manifest.name()
            );
        }
        if self.deps.kubectl.context().field_manager_name.is_none() {
            anyhow::bail!("apply_status requires a field_manager_name in the cluster context");
        }
        self.run_action(ApplyStatus { manifest }).await
    }

    /// Delete by kind and name.
    pub async fn delete(&self, target: ResourceRef) -> anyhow::Result<()> {
        self.run_action(Delete { target }).await
    }

    /// Add, update (string value) or remove (`None` value) labels.
    pub async fn label(
        &self,
        target: ResourceRef,
        labels: BTreeMap<String, Option<String>>,
        overwrite: bool,
    ) -> anyhow::Result<()> {
        self.run_action(Label {
            target,
            labels,
            overwrite,
        })
        .await
    }

    // ---------------------------------------------------------------------
    // Query verbs
    // ---------------------------------------------------------------------

    /// Fetch by kind and name, verified against the reference.
    pub async fn get(&self, target: ResourceRef) -> anyhow::Result<Value> {
        self.run_action(Get { target }).await
    }

    /// Fetch and assert. The callback receives the fetched document and
    /// signals failure by returning an error; failures are retried under
    /// the scenario's retry options.
    pub async fn assert<F>(&self, target: ResourceRef, test: F) -> anyhow::Result<()>
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run_action(Assert {
            target,
            test: Arc::new(test),
        })
        .await
    }

    /// Succeeds only once the resource is gone.
    pub async fn assert_absence(&self, target: ResourceRef) -> anyhow::Result<()> {
        self.run_action(AssertAbsence { target }).await
    }

    /// List all resources of a kind and assert on the item list.
    pub async fn assert_list<F>(
        &self,
        api_version: impl Into<String>,
        kind: impl Into<String>,
        test: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run_action(AssertList {
            api_version: api_version.into(),
            kind: kind.into(),
            test: Arc::new(test),
        })
        .await
    }

    /// Require exactly one resource of a kind and assert on it.
    pub async fn assert_one<F>(
        &self,
        api_version: impl Into<String>,
        kind: impl Into<String>,
        test: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run_action(AssertOne {
            api_version: api_version.into(),
            kind: kind.into(),
            filter: None,
            test: Arc::new(test),
        })
        .await
    }

    /// Like [`Scenario::assert_one`], filtered by a predicate first.
    pub async fn assert_one_where<W, F>(
        &self,
        api_version: impl Into<String>,
        kind: impl Into<String>,
        filter: W,
        test: F,
    ) -> anyhow::Result<()>
    where
        W: Fn(&Value) -> bool + Send + Sync + 'static,
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run_action(AssertOne {
            api_version: api_version.into(),
            kind: kind.into(),
            filter: Some(Arc::new(filter)),
            test: Arc::new(test),
        })
        .await
    }

    /// Expect an apply to be refused; assert on the refusal error.
    pub async fn assert_apply_error<F>(
        &self,
        manifest: impl Into<ManifestSource>,
        test: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(&anyhow::Error) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let manifest = Manifest::parse(manifest)?;
        self.run_action(AssertApplyError {
            manifest,
            test: Arc::new(test),
        })
        .await
    }

    /// Expect a create to be refused; assert on the refusal error.
    pub async fn assert_create_error<F>(
        &self,
        manifest: impl Into<ManifestSource>,
        test: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(&anyhow::Error) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let manifest = Manifest::parse(manifest)?;
        self.run_action(AssertCreateError {
            manifest,
            test: Arc::new(test),
        })
        .await
    }

    // ---------------------------------------------------------------------
    // Scope derivation
    // ---------------------------------------------------------------------

    /// Create a namespace and return a view bound to it. All operations
    /// on the view run with the new namespace layered over the default
    /// context; the namespace is deleted during cleanup like any other
    /// created resource.
    pub async fn new_namespace(
        &self,
        input: impl Into<NamespaceInput>,
    ) -> anyhow::Result<Scenario> {
        let name = self.apply_namespace(input).await?;
        Ok(self.extend_view(ClusterContext::namespaced(name)))
    }

    /// A view bound to another cluster. The view may itself create
    /// namespaces, yielding a view bound to both.
    pub fn use_cluster(&self, cluster: &ClusterRef) -> Scenario {
        let mut overlay = ClusterContext::default();
        overlay.context = cluster.context.clone();
        overlay.kubeconfig = cluster.kubeconfig.clone();
        self.extend_view(overlay)
    }

    fn extend_view(&self, overlay: ClusterContext) -> Scenario {
        Scenario {
            name: self.name.clone(),
            deps: Deps {
                kubectl: self.deps.kubectl.extend(&overlay),
                ..self.deps.clone()
            },
            options: self.options,
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Pause the scenario for a duration string like `"1s"` or `"250ms"`.
    pub async fn sleep(&self, duration: &str) -> anyhow::Result<()> {
        let duration = DurationMs::parse(duration)?;
        tokio::time::sleep(duration.to_std()).await;
        Ok(())
    }

    async fn run_action<A: Action>(&self, action: A) -> anyhow::Result<A::Output> {
        self.deps.recorder.record(Event::ActionStart {
            description: action.describe(),
        });

        let outcome = retry_until(&self.deps.recorder, self.options, || {
            action.attempt(&self.deps)
        })
        .await;

        match outcome {
            Ok(attempt) => {
                if let Some(revert) = attempt.revert {
                    self.push_revert(revert);
                }
                self.deps.recorder.record(Event::ActionEnd {
                    ok: true,
                    error: None,
                });
                Ok(attempt.output)
            }
            Err(err) => {
                self.deps.recorder.record(Event::ActionEnd {
                    ok: false,
                    error: Some(ErrorSummary::from_error(&err)),
                });
                Err(err)
            }
        }
    }

    /// Register a revert so its execution shows up in the event log the
    /// same way forward actions do.
    fn push_revert(&self, revert: Revert) {
        let recorder = self.deps.recorder.clone();
        let Revert { description, run } = revert;
        self.deps.reverting.add(move || {
            let recorder = recorder.clone();
            let run = run.clone();
            let description = description.clone();
            async move {
                recorder.record(Event::ActionStart { description });
                match run().await {
                    Ok(()) => {
                        recorder.record(Event::ActionEnd {
                            ok: true,
                            error: None,
                        });
                        Ok(())
                    }
                    Err(err) => {
                        recorder.record(Event::ActionEnd {
                            ok: false,
                            error: Some(ErrorSummary::from_error(&err)),
                        });
                        Err(err)
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .finish()
    }
}
