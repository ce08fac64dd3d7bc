//! Scenario entry point for host test runners.
//!
//! The host runner (normally `#[tokio::test]`) owns test discovery,
//! parallelism and pass/fail reporting; this module owns the scenario
//! lifecycle around the user's body: record `ScenarioStart`, run the body
//! under the scenario deadline, drain the reverting stack (or skip it
//! when asked to preserve state), record `ScenarioEnd`, and print the
//! Markdown report when the scenario failed or the operator asked for it.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use kest_common::{events_to_yaml, ClusterContext, DurationMs, Event};
use kest_report::{parse_events, render_markdown};

use crate::kubectl::Kubectl;
use crate::process::{ProcessRunner, TokioRunner};
use crate::recorder::Recorder;
use crate::reverting::Reverting;
use crate::scenario::{Deps, Scenario};
use crate::shell::Shell;

/// Always print the Markdown report, even for passing scenarios.
pub const SHOW_REPORT_ENV: &str = "KEST_SHOW_REPORT";

/// Also dump the raw event sequence as YAML.
pub const SHOW_EVENTS_ENV: &str = "KEST_SHOW_EVENTS";

/// Skip cleanup for failed scenarios, preserving cluster state.
pub const PRESERVE_ON_FAILURE_ENV: &str = "KEST_PRESERVE_ON_FAILURE";

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name)
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Per-scenario settings.
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    /// Total deadline for the scenario body.
    pub timeout: DurationMs,
    /// Field manager recorded for server-side applies.
    pub field_manager: String,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            timeout: DurationMs::from_millis(60_000),
            field_manager: "kest".to_string(),
        }
    }
}

/// Default dependencies: a real kubectl over a fresh recorder.
pub fn default_deps(options: &ScenarioOptions) -> Deps {
    let recorder = Recorder::new();
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioRunner::new());
    let context = ClusterContext::default().with_field_manager(options.field_manager.clone());
    let kubectl = Arc::new(Kubectl::new(runner.clone(), recorder.clone(), context));
    Deps {
        kubectl,
        reverting: Reverting::new(),
        shell: Shell::new(runner, recorder.clone()),
        recorder,
    }
}

/// Run a scenario body against the real cluster client.
pub async fn run_scenario<F, Fut>(name: &str, body: F) -> anyhow::Result<()>
where
    F: FnOnce(Scenario) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let options = ScenarioOptions::default();
    let deps = default_deps(&options);
    run_scenario_with(name, deps, options, body).await
}

/// Run a scenario body over injected dependencies.
///
/// This is the full lifecycle: events are bracketed by
/// `ScenarioStart`/`ScenarioEnd`, the body runs under the scenario
/// deadline, and the reverting stack is drained afterwards — unless the
/// preserve-on-failure flag is set and the body failed, in which case
/// cleanup is skipped and the created resources stay behind for
/// inspection.
pub async fn run_scenario_with<F, Fut>(
    name: &str,
    deps: Deps,
    options: ScenarioOptions,
    body: F,
) -> anyhow::Result<()>
where
    F: FnOnce(Scenario) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    deps.recorder.record(Event::ScenarioStart {
        name: name.to_string(),
    });

    let scenario = Scenario::new(name, deps.clone());
    let body_result = match tokio::time::timeout(options.timeout.to_std(), body(scenario)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "scenario deadline of {} exceeded",
            options.timeout
        )),
    };

    let cleanup_result = if body_result.is_err() && env_flag(PRESERVE_ON_FAILURE_ENV) {
        warn!("preserving cluster state of failed scenario {name:?}");
        deps.reverting.skip(&deps.recorder);
        Ok(())
    } else {
        deps.reverting.revert(&deps.recorder).await
    };

    deps.recorder.record(Event::ScenarioEnd);

    let events = deps.recorder.events();
    let failed = body_result.is_err() || cleanup_result.is_err();
    if failed || env_flag(SHOW_REPORT_ENV) {
        let report = parse_events(&events);
        println!("{}", render_markdown(&report));
    }
    if env_flag(SHOW_EVENTS_ENV) {
        match events_to_yaml(&events) {
            Ok(yaml) => println!("{yaml}"),
            Err(err) => warn!("failed to serialize event stream: {err}"),
        }
    }

    body_result.and(cleanup_result)
}
