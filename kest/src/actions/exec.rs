//! Free-form exec action over the shell adapter.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::scenario::Deps;
use crate::shell::Shell;

use super::{Action, Attempt, Revert};

type ExecFn =
    Arc<dyn Fn(Shell) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// Run user code under the shell adapter, with an optional revert.
///
/// The action is a mutate: it always registers a revert, defaulting to a
/// no-op when the user supplied none, so cleanup reporting shows the
/// exec step either way.
pub struct Exec {
    name: String,
    run: ExecFn,
    revert: Option<ExecFn>,
}

impl Exec {
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(Shell) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(
                move |shell| -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
                    Box::pin(run(shell))
                },
            ),
            revert: None,
        }
    }

    pub fn with_revert<F, Fut>(mut self, revert: F) -> Self
    where
        F: Fn(Shell) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.revert = Some(Arc::new(
            move |shell| -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
                Box::pin(revert(shell))
            },
        ));
        self
    }
}

#[async_trait]
impl Action for Exec {
    type Output = ();

    fn describe(&self) -> String {
        format!("Exec {}", self.name)
    }

    async fn attempt(&self, deps: &Deps) -> anyhow::Result<Attempt<()>> {
        (self.run)(deps.shell.clone()).await?;

        let revert = match &self.revert {
            Some(revert) => {
                let revert = revert.clone();
                let shell = deps.shell.clone();
                Revert::new(format!("Revert {}", self.name), move || {
                    revert(shell.clone())
                })
            }
            None => Revert::noop(format!("Revert {}", self.name)),
        };
        Ok(Attempt::mutate((), revert))
    }
}

impl std::fmt::Debug for Exec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exec")
            .field("name", &self.name)
            .field("has_revert", &self.revert.is_some())
            .finish()
    }
}
