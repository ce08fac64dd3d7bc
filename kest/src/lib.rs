//! KEST — an end-to-end scenario testing engine for Kubernetes-style
//! declarative APIs.
//!
//! A scenario is a sequence of mutating and observing actions against a
//! live cluster. The engine executes each action through a command-line
//! client, retries observations against the cluster's eventual
//! consistency, guarantees reverse-order cleanup of everything the
//! scenario created, and records a deterministic event stream from which
//! `kest-report` renders a reproducible Markdown report.
//!
//! ```no_run
//! use kest::{run_scenario, ResourceRef};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! run_scenario("configmap carries its data", |s| async move {
//!     s.given("an empty namespace");
//!     let ns = s.new_namespace(()).await?;
//!
//!     s.when("a configmap is applied");
//!     ns.apply(
//!         "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\ndata:\n  mode: demo\n",
//!     )
//!     .await?;
//!
//!     s.then("it can be read back");
//!     ns.assert(ResourceRef::new("v1", "ConfigMap", "cm"), |cm| {
//!         anyhow::ensure!(
//!             cm["data"]["mode"].as_str() == Some("demo"),
//!             "unexpected data: {cm:?}"
//!         );
//!         Ok(())
//!     })
//!     .await?;
//!     Ok(())
//! })
//! .await
//! # }
//! ```

pub mod actions;
pub mod kubectl;
pub mod process;
pub mod recorder;
pub mod retry;
pub mod reverting;
pub mod runner;
pub mod scenario;
pub mod shell;
pub mod testing;

pub use actions::{Exec, NamespaceInput};
pub use kubectl::{
    is_already_exists, is_not_found, ClusterClient, DeleteOptions, Kubectl, LabelOptions,
    PatchOptions,
};
pub use process::{ProcessOutput, ProcessRunner, TokioRunner};
pub use recorder::Recorder;
pub use retry::{retry_until, RetryOptions};
pub use reverting::Reverting;
pub use runner::{run_scenario, run_scenario_with, ScenarioOptions};
pub use scenario::{ClusterRef, Deps, Scenario};
pub use shell::Shell;

pub use kest_common::{
    generated_name, random_suffix, ClusterContext, DurationMs, ErrorSummary, Event, Manifest,
    ManifestSource, ResourceRef, RetryReason,
};
