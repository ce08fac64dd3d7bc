//! Cluster client port and its kubectl adapter.
//!
//! The engine never speaks to the API server directly; every cluster
//! mutation and read goes through [`ClusterClient`], implemented here by
//! shelling out to `kubectl`. Each invocation is recorded as a
//! `CommandRun`/`CommandResult` pair so the report can replay exactly
//! what ran.
//!
//! Errors surface as the client's stderr, verbatim. A "not found" error
//! therefore contains the literal substring `(NotFound)` — the protocol
//! `assert_absence` relies on.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use kest_common::{ClusterContext, Event, Manifest};

use crate::process::ProcessRunner;
use crate::recorder::Recorder;

const PROGRAM: &str = "kubectl";

/// Options for `delete`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub ignore_not_found: bool,
}

/// Options for `label`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelOptions {
    pub overwrite: bool,
}

/// Options for `patch`.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    /// Patch strategy (`merge`, `json`, `strategic`). Defaults to `merge`.
    pub patch_type: Option<String>,
}

/// Whether an error is the cluster's "not found" signal.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|e| e.to_string().contains("(NotFound)"))
}

/// Whether an error is the cluster's "already exists" signal.
pub fn is_already_exists(err: &anyhow::Error) -> bool {
    err.chain().any(|e| e.to_string().contains("(AlreadyExists)"))
}

/// Capability surface the engine consumes from the cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// A client bound to this one's context layered with `overlay`.
    fn extend(&self, overlay: &ClusterContext) -> Arc<dyn ClusterClient>;

    /// The context this client is bound to.
    fn context(&self) -> &ClusterContext;

    /// Server-side apply. Returns the client's output.
    async fn apply(&self, manifest: &Manifest, ctx: Option<&ClusterContext>)
        -> anyhow::Result<String>;

    /// Server-side apply against the status subresource. Requires a
    /// `field_manager_name` in the effective context.
    async fn apply_status(
        &self,
        manifest: &Manifest,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String>;

    /// Create; fails if the resource already exists.
    async fn create(
        &self,
        manifest: &Manifest,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String>;

    /// Fetch one resource as YAML.
    async fn get(
        &self,
        type_name: &str,
        name: &str,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String>;

    /// List resources of a kind as a YAML list document.
    async fn list(&self, type_name: &str, ctx: Option<&ClusterContext>)
        -> anyhow::Result<String>;

    async fn patch(
        &self,
        type_name: &str,
        name: &str,
        patch: &str,
        options: PatchOptions,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String>;

    async fn delete(
        &self,
        type_name: &str,
        name: &str,
        options: DeleteOptions,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String>;

    /// Add (`Some(value)`) or remove (`None`) labels.
    async fn label(
        &self,
        type_name: &str,
        name: &str,
        labels: &BTreeMap<String, Option<String>>,
        options: LabelOptions,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String>;
}

/// `kubectl` adapter over a [`ProcessRunner`].
#[derive(Clone)]
pub struct Kubectl {
    runner: Arc<dyn ProcessRunner>,
    recorder: Recorder,
    context: ClusterContext,
}

impl Kubectl {
    pub fn new(runner: Arc<dyn ProcessRunner>, recorder: Recorder, context: ClusterContext) -> Self {
        Self {
            runner,
            recorder,
            context,
        }
    }

    fn effective(&self, ctx: Option<&ClusterContext>) -> ClusterContext {
        match ctx {
            Some(over) => self.context.layer(over),
            None => self.context.clone(),
        }
    }

    fn context_args(context: &ClusterContext) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(kubeconfig) = &context.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.clone());
        }
        if let Some(name) = &context.context {
            args.push("--context".to_string());
            args.push(name.clone());
        }
        if let Some(namespace) = &context.namespace {
            args.push("-n".to_string());
            args.push(namespace.clone());
        }
        args
    }

    async fn run_recorded(
        &self,
        args: Vec<String>,
        stdin: Option<String>,
        stdin_language: Option<&str>,
        stdout_language: Option<&str>,
    ) -> anyhow::Result<String> {
        self.recorder.record(Event::CommandRun {
            cmd: PROGRAM.to_string(),
            args: args.clone(),
            stdin: stdin.clone(),
            stdin_language: stdin_language.map(str::to_string),
        });

        let output = self.runner.run(PROGRAM, &args, stdin.as_deref()).await?;

        self.recorder.record(Event::CommandResult {
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            stdout_language: if output.success() {
                stdout_language.map(str::to_string)
            } else {
                None
            },
            stderr_language: None,
        });

        if output.success() {
            Ok(output.stdout)
        } else {
            let stderr = output.stderr.trim();
            if stderr.is_empty() {
                Err(anyhow::anyhow!(
                    "kubectl exited with code {}",
                    output.exit_code
                ))
            } else {
                Err(anyhow::anyhow!("{stderr}"))
            }
        }
    }
}

#[async_trait]
impl ClusterClient for Kubectl {
    fn extend(&self, overlay: &ClusterContext) -> Arc<dyn ClusterClient> {
        Arc::new(Kubectl {
            runner: self.runner.clone(),
            recorder: self.recorder.clone(),
            context: self.context.layer(overlay),
        })
    }

    fn context(&self) -> &ClusterContext {
        &self.context
    }

    async fn apply(
        &self,
        manifest: &Manifest,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let mut args = vec!["apply".to_string(), "--server-side".to_string()];
        if let Some(manager) = &context.field_manager_name {
            args.push("--field-manager".to_string());
            args.push(manager.clone());
        }
        args.extend(Self::context_args(&context));
        args.push("-f".to_string());
        args.push("-".to_string());
        self.run_recorded(args, Some(manifest.to_yaml()?), Some("yaml"), None)
            .await
    }

    async fn apply_status(
        &self,
        manifest: &Manifest,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let Some(manager) = context.field_manager_name.clone() else {
            anyhow::bail!("apply_status requires a field_manager_name in the cluster context");
        };
        let mut args = vec![
            "apply".to_string(),
            "--server-side".to_string(),
            "--subresource".to_string(),
            "status".to_string(),
            "--field-manager".to_string(),
            manager,
        ];
        args.extend(Self::context_args(&context));
        args.push("-f".to_string());
        args.push("-".to_string());
        self.run_recorded(args, Some(manifest.to_yaml()?), Some("yaml"), None)
            .await
    }

    async fn create(
        &self,
        manifest: &Manifest,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let mut args = vec!["create".to_string()];
        args.extend(Self::context_args(&context));
        args.push("-f".to_string());
        args.push("-".to_string());
        self.run_recorded(args, Some(manifest.to_yaml()?), Some("yaml"), None)
            .await
    }

    async fn get(
        &self,
        type_name: &str,
        name: &str,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let mut args = vec!["get".to_string(), type_name.to_string(), name.to_string()];
        args.extend(Self::context_args(&context));
        args.push("-o".to_string());
        args.push("yaml".to_string());
        self.run_recorded(args, None, None, Some("yaml")).await
    }

    async fn list(
        &self,
        type_name: &str,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let mut args = vec!["get".to_string(), type_name.to_string()];
        args.extend(Self::context_args(&context));
        args.push("-o".to_string());
        args.push("yaml".to_string());
        self.run_recorded(args, None, None, Some("yaml")).await
    }

    async fn patch(
        &self,
        type_name: &str,
        name: &str,
        patch: &str,
        options: PatchOptions,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let mut args = vec![
            "patch".to_string(),
            type_name.to_string(),
            name.to_string(),
            "--type".to_string(),
            options.patch_type.unwrap_or_else(|| "merge".to_string()),
            "-p".to_string(),
            patch.to_string(),
        ];
        args.extend(Self::context_args(&context));
        self.run_recorded(args, None, None, None).await
    }

    async fn delete(
        &self,
        type_name: &str,
        name: &str,
        options: DeleteOptions,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let mut args = vec!["delete".to_string(), type_name.to_string(), name.to_string()];
        if options.ignore_not_found {
            args.push("--ignore-not-found".to_string());
        }
        args.extend(Self::context_args(&context));
        self.run_recorded(args, None, None, None).await
    }

    async fn label(
        &self,
        type_name: &str,
        name: &str,
        labels: &BTreeMap<String, Option<String>>,
        options: LabelOptions,
        ctx: Option<&ClusterContext>,
    ) -> anyhow::Result<String> {
        let context = self.effective(ctx);
        let mut args = vec!["label".to_string(), type_name.to_string(), name.to_string()];
        for (key, value) in labels {
            match value {
                Some(value) => args.push(format!("{key}={value}")),
                None => args.push(format!("{key}-")),
            }
        }
        if options.overwrite {
            args.push("--overwrite".to_string());
        }
        args.extend(Self::context_args(&context));
        self.run_recorded(args, None, None, None).await
    }
}

impl std::fmt::Debug for Kubectl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kubectl")
            .field("context", &self.context)
            .finish()
    }
}
