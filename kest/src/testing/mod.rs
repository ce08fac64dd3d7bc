//! Test support: an in-memory kubectl simulation and logging helpers.
//!
//! Nothing here talks to a real cluster; it exists so scenario behavior
//! (events, retries, cleanup ordering) can be exercised hermetically in
//! CI.

mod mock;

pub use mock::{MockKube, MockKubeBuilder};

use std::sync::Arc;

use kest_common::ClusterContext;

use crate::kubectl::Kubectl;
use crate::process::ProcessRunner;
use crate::recorder::Recorder;
use crate::reverting::Reverting;
use crate::scenario::Deps;
use crate::shell::Shell;

/// Scenario dependencies wired over an arbitrary process runner.
pub fn test_deps(runner: Arc<dyn ProcessRunner>) -> Deps {
    let recorder = Recorder::new();
    let context = ClusterContext::default().with_field_manager("kest");
    let kubectl = Arc::new(Kubectl::new(runner.clone(), recorder.clone(), context));
    Deps {
        kubectl,
        reverting: Reverting::new(),
        shell: Shell::new(runner, recorder.clone()),
        recorder,
    }
}

/// Initialize tracing output for tests. Safe to call repeatedly.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
