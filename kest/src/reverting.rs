//! LIFO stack of cleanup callbacks drained at scenario end.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tracing::warn;

use kest_common::Event;

use crate::recorder::Recorder;

/// A registered revert callback. Re-callable so a failed drain can leave
/// it on the stack for a later resume.
pub type RevertFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// Shared handle to a scenario's revert stack.
///
/// Mutating actions push one callback per successful forward phase; the
/// scenario drains the stack in reverse order when its body returns or
/// fails. Cloning yields another handle to the same stack.
#[derive(Clone, Default)]
pub struct Reverting {
    stack: Arc<Mutex<Vec<RevertFn>>>,
}

impl Reverting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup callback. Runs after all callbacks added later.
    pub fn add<F, Fut>(&self, revert: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(Arc::new(
            move || -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
                Box::pin(revert())
            },
        ));
    }

    pub(crate) fn push(&self, revert: RevertFn) {
        let mut stack = self.stack.lock().unwrap_or_else(|e| e.into_inner());
        stack.push(revert);
    }

    pub fn len(&self) -> usize {
        let stack = self.stack.lock().unwrap_or_else(|e| e.into_inner());
        stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the stack, newest callback first.
    ///
    /// Each callback is awaited before the next is popped. When a callback
    /// fails it is restored onto the stack, `RevertingsEnd` is still
    /// recorded, and the error is re-raised; a later call to `revert`
    /// resumes from the restored callback.
    pub async fn revert(&self, recorder: &Recorder) -> anyhow::Result<()> {
        recorder.record(Event::RevertingsStart);
        loop {
            let popped = {
                let mut stack = self.stack.lock().unwrap_or_else(|e| e.into_inner());
                stack.pop()
            };
            let Some(callback) = popped else {
                break;
            };
            if let Err(err) = callback().await {
                warn!("revert callback failed, restoring it onto the stack: {err:#}");
                self.push(callback);
                recorder.record(Event::RevertingsEnd);
                return Err(err);
            }
        }
        recorder.record(Event::RevertingsEnd);
        Ok(())
    }

    /// Leave every callback unexecuted, recording `RevertingsSkipped`.
    ///
    /// Used when the preserve-on-failure flag asks for the cluster state
    /// to be kept for inspection.
    pub fn skip(&self, recorder: &Recorder) {
        recorder.record(Event::RevertingsSkipped);
    }
}

impl std::fmt::Debug for Reverting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reverting").field("len", &self.len()).finish()
    }
}
