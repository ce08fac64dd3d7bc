//! In-memory kubectl simulation.
//!
//! [`MockKube`] implements [`ProcessRunner`] by interpreting kubectl
//! argument vectors against an in-memory resource store: apply upserts,
//! create fails on an existing name with `(AlreadyExists)`, get and list
//! serve YAML back, delete honors `--ignore-not-found`, label mutates
//! metadata. Error strings mirror the real client's shape, including the
//! `(NotFound)` protocol the engine relies on.
//!
//! Scripted failures can be injected per verb for fault-injection tests
//! (admission rejections, name collisions, flaky reads). The mock does
//! not enforce namespace existence; scenarios that need that behavior
//! belong on a real cluster.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_yaml::Value;

use kest_common::Manifest;

use crate::process::{ProcessError, ProcessOutput, ProcessRunner};

type ResourceKey = (String, String, String); // (type name, namespace, name)

#[derive(Debug, Clone)]
struct InjectedFailure {
    verb: String,
    matching: Option<String>,
    skip: u32,
    remaining: u32,
    exit_code: i32,
    stderr: String,
}

#[derive(Default)]
struct MockState {
    resources: BTreeMap<ResourceKey, Value>,
    failures: Vec<InjectedFailure>,
}

/// Builder for a scripted mock cluster.
#[derive(Default)]
pub struct MockKubeBuilder {
    state: MockState,
}

impl MockKubeBuilder {
    /// Pre-populate the store with a resource in the given namespace
    /// (empty string for cluster-scoped kinds).
    pub fn seed(mut self, namespace: &str, manifest_yaml: &str) -> Self {
        let manifest = Manifest::parse(manifest_yaml).expect("seed manifest must be valid");
        let key = (
            manifest.kubectl_type(),
            namespace_for(manifest.kind(), Some(namespace.to_string())),
            manifest.name().to_string(),
        );
        self.state.resources.insert(key, manifest.value().clone());
        self
    }

    /// Fail the next matching call of `verb` with the given stderr.
    pub fn fail(self, verb: &str, stderr: &str) -> Self {
        self.fail_times(verb, 1, stderr)
    }

    /// Fail the next `times` matching calls of `verb`.
    pub fn fail_times(mut self, verb: &str, times: u32, stderr: &str) -> Self {
        self.state.failures.push(InjectedFailure {
            verb: verb.to_string(),
            matching: None,
            skip: 0,
            remaining: times,
            exit_code: 1,
            stderr: stderr.to_string(),
        });
        self
    }

    /// Let `skip` matching calls of `verb` pass, then fail the next one.
    pub fn fail_after(mut self, verb: &str, skip: u32, stderr: &str) -> Self {
        self.state.failures.push(InjectedFailure {
            verb: verb.to_string(),
            matching: None,
            skip,
            remaining: 1,
            exit_code: 1,
            stderr: stderr.to_string(),
        });
        self
    }

    /// Restrict the most recently added failure to calls whose rendered
    /// command line (or stdin) contains `needle`.
    pub fn matching(mut self, needle: &str) -> Self {
        if let Some(failure) = self.state.failures.last_mut() {
            failure.matching = Some(needle.to_string());
        }
        self
    }

    pub fn build(self) -> Arc<MockKube> {
        Arc::new(MockKube {
            state: Mutex::new(self.state),
        })
    }
}

/// The scripted in-memory cluster.
pub struct MockKube {
    state: Mutex<MockState>,
}

impl MockKube {
    pub fn builder() -> MockKubeBuilder {
        MockKubeBuilder::default()
    }

    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    /// Whether a resource currently exists in the store.
    pub fn has(&self, type_name: &str, namespace: &str, name: &str) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.resources.contains_key(&(
            type_name.to_string(),
            namespace.to_string(),
            name.to_string(),
        ))
    }

    /// Names of stored resources of a type, across namespaces.
    pub fn names_of(&self, type_name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .resources
            .keys()
            .filter(|(t, _, _)| t == type_name)
            .map(|(_, _, name)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for MockKube {
    async fn run(
        &self,
        cmd: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<ProcessOutput, ProcessError> {
        if cmd == "sh" {
            // The shell adapter is out of simulation scope; scripts
            // succeed silently unless a failure is injected for "sh".
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(failure) = take_failure(&mut state, "sh", args, stdin) {
                return Ok(failure);
            }
            return Ok(ok(""));
        }

        let verb = args.first().map(String::as_str).unwrap_or("");
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(failure) = take_failure(&mut state, verb, args, stdin) {
            return Ok(failure);
        }

        let call = ParsedCall::parse(args.get(1..).unwrap_or(&[]));
        Ok(match verb {
            "apply" => apply(&mut state, &call, stdin),
            "create" => create(&mut state, &call, stdin),
            "get" => get_or_list(&state, &call),
            "delete" => delete(&mut state, &call),
            "label" => label(&mut state, &call),
            "patch" => patch(&mut state, &call),
            other => fail(1, &format!("error: unknown command {other:?}")),
        })
    }
}

fn take_failure(
    state: &mut MockState,
    verb: &str,
    args: &[String],
    stdin: Option<&str>,
) -> Option<ProcessOutput> {
    let haystack = format!("{} {}", args.join(" "), stdin.unwrap_or(""));
    for failure in &mut state.failures {
        if failure.verb != verb {
            continue;
        }
        if let Some(needle) = &failure.matching {
            if !haystack.contains(needle.as_str()) {
                continue;
            }
        }
        if failure.skip > 0 {
            failure.skip -= 1;
            return None;
        }
        if failure.remaining > 0 {
            failure.remaining -= 1;
            return Some(fail(failure.exit_code, &failure.stderr));
        }
        return None;
    }
    None
}

/// kubectl argument vector, split into positionals and flags.
#[derive(Debug, Default)]
struct ParsedCall {
    positional: Vec<String>,
    namespace: Option<String>,
    subresource: Option<String>,
    ignore_not_found: bool,
    overwrite: bool,
    patch_body: Option<String>,
}

impl ParsedCall {
    fn parse(args: &[String]) -> Self {
        let mut call = ParsedCall::default();
        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-n" | "--namespace" => call.namespace = iter.next().cloned(),
                "--subresource" => call.subresource = iter.next().cloned(),
                "-p" => call.patch_body = iter.next().cloned(),
                "--kubeconfig" | "--context" | "--field-manager" | "--type" | "-o" => {
                    let _ = iter.next();
                }
                "-f" => {
                    let _ = iter.next();
                }
                "--ignore-not-found" => call.ignore_not_found = true,
                "--overwrite" => call.overwrite = true,
                "--server-side" => {}
                other => call.positional.push(other.to_string()),
            }
        }
        call
    }
}

fn ok(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn fail(exit_code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn plural(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}

/// Cluster-scoped kinds ignore the namespace flag.
fn namespace_for(kind: &str, namespace: Option<String>) -> String {
    if kind == "Namespace" {
        String::new()
    } else {
        namespace.unwrap_or_else(|| "default".to_string())
    }
}

fn parse_stdin_manifest(stdin: Option<&str>) -> Result<Manifest, ProcessOutput> {
    let Some(text) = stdin else {
        return Err(fail(1, "error: no manifest piped to stdin"));
    };
    Manifest::parse(text).map_err(|err| fail(1, &format!("error: {err}")))
}

fn apply(state: &mut MockState, call: &ParsedCall, stdin: Option<&str>) -> ProcessOutput {
    let manifest = match parse_stdin_manifest(stdin) {
        Ok(manifest) => manifest,
        Err(output) => return output,
    };
    let key = (
        manifest.kubectl_type(),
        namespace_for(manifest.kind(), call.namespace.clone()),
        manifest.name().to_string(),
    );

    if call.subresource.as_deref() == Some("status") {
        let Some(existing) = state.resources.get_mut(&key) else {
            return fail(
                1,
                &format!(
                    "Error from server (NotFound): {} \"{}\" not found",
                    plural(manifest.kind()),
                    manifest.name()
                ),
            );
        };
        if let (Value::Mapping(existing), Some(status)) =
            (existing, manifest.value().get("status"))
        {
            existing.insert(Value::String("status".into()), status.clone());
        }
        return ok(&format!(
            "{}/{} serverside-applied",
            manifest.kind().to_lowercase(),
            manifest.name()
        ));
    }

    state.resources.insert(key, manifest.value().clone());
    ok(&format!(
        "{}/{} serverside-applied",
        manifest.kind().to_lowercase(),
        manifest.name()
    ))
}

fn create(state: &mut MockState, call: &ParsedCall, stdin: Option<&str>) -> ProcessOutput {
    let manifest = match parse_stdin_manifest(stdin) {
        Ok(manifest) => manifest,
        Err(output) => return output,
    };
    let key = (
        manifest.kubectl_type(),
        namespace_for(manifest.kind(), call.namespace.clone()),
        manifest.name().to_string(),
    );
    if state.resources.contains_key(&key) {
        return fail(
            1,
            &format!(
                "Error from server (AlreadyExists): {} \"{}\" already exists",
                plural(manifest.kind()),
                manifest.name()
            ),
        );
    }
    state.resources.insert(key, manifest.value().clone());
    ok(&format!(
        "{}/{} created",
        manifest.kind().to_lowercase(),
        manifest.name()
    ))
}

fn kind_of(type_name: &str) -> &str {
    type_name.split('.').next().unwrap_or(type_name)
}

fn get_or_list(state: &MockState, call: &ParsedCall) -> ProcessOutput {
    match call.positional.as_slice() {
        [type_name, name] => {
            let key = (
                type_name.clone(),
                namespace_for(kind_of(type_name), call.namespace.clone()),
                name.clone(),
            );
            match state.resources.get(&key) {
                Some(value) => match serde_yaml::to_string(value) {
                    Ok(yaml) => ok(&yaml),
                    Err(err) => fail(1, &format!("error: {err}")),
                },
                None => fail(
                    1,
                    &format!(
                        "Error from server (NotFound): {} \"{name}\" not found",
                        plural(kind_of(type_name))
                    ),
                ),
            }
        }
        [type_name] => {
            let namespace = namespace_for(kind_of(type_name), call.namespace.clone());
            let items: Vec<Value> = state
                .resources
                .iter()
                .filter(|((t, ns, _), _)| t == type_name && *ns == namespace)
                .map(|(_, value)| value.clone())
                .collect();
            let mut list = serde_yaml::Mapping::new();
            list.insert(Value::String("apiVersion".into()), Value::String("v1".into()));
            list.insert(Value::String("kind".into()), Value::String("List".into()));
            list.insert(Value::String("items".into()), Value::Sequence(items));
            match serde_yaml::to_string(&Value::Mapping(list)) {
                Ok(yaml) => ok(&yaml),
                Err(err) => fail(1, &format!("error: {err}")),
            }
        }
        _ => fail(1, "error: get expects a type and an optional name"),
    }
}

fn delete(state: &mut MockState, call: &ParsedCall) -> ProcessOutput {
    let [type_name, name] = call.positional.as_slice() else {
        return fail(1, "error: delete expects a type and a name");
    };
    let key = (
        type_name.clone(),
        namespace_for(kind_of(type_name), call.namespace.clone()),
        name.clone(),
    );
    if state.resources.remove(&key).is_some() {
        ok(&format!(
            "{} \"{name}\" deleted",
            kind_of(type_name).to_lowercase()
        ))
    } else if call.ignore_not_found {
        ok("")
    } else {
        fail(
            1,
            &format!(
                "Error from server (NotFound): {} \"{name}\" not found",
                plural(kind_of(type_name))
            ),
        )
    }
}

fn label(state: &mut MockState, call: &ParsedCall) -> ProcessOutput {
    let Some((type_name, rest)) = call.positional.split_first() else {
        return fail(1, "error: label expects a type, a name and label pairs");
    };
    let Some((name, pairs)) = rest.split_first() else {
        return fail(1, "error: label expects a name and label pairs");
    };
    let key = (
        type_name.clone(),
        namespace_for(kind_of(type_name), call.namespace.clone()),
        name.clone(),
    );
    let Some(value) = state.resources.get_mut(&key) else {
        return fail(
            1,
            &format!(
                "Error from server (NotFound): {} \"{name}\" not found",
                plural(kind_of(type_name))
            ),
        );
    };

    let Value::Mapping(root) = value else {
        return fail(1, "error: stored resource is not a mapping");
    };
    let metadata = root
        .entry(Value::String("metadata".into()))
        .or_insert_with(|| Value::Mapping(serde_yaml::Mapping::new()));
    let Value::Mapping(metadata) = metadata else {
        return fail(1, "error: stored metadata is not a mapping");
    };
    let labels = metadata
        .entry(Value::String("labels".into()))
        .or_insert_with(|| Value::Mapping(serde_yaml::Mapping::new()));
    let Value::Mapping(labels) = labels else {
        return fail(1, "error: stored labels are not a mapping");
    };

    for pair in pairs {
        if let Some((label_key, label_value)) = pair.split_once('=') {
            let slot = Value::String(label_key.to_string());
            if labels.contains_key(&slot) && !call.overwrite {
                return fail(
                    1,
                    &format!(
                        "error: '{label_key}' already has a value, and --overwrite is false"
                    ),
                );
            }
            labels.insert(slot, Value::String(label_value.to_string()));
        } else if let Some(stripped) = pair.strip_suffix('-') {
            labels.remove(Value::String(stripped.to_string()));
        } else {
            return fail(1, &format!("error: invalid label pair {pair:?}"));
        }
    }
    ok(&format!(
        "{}/{name} labeled",
        kind_of(type_name).to_lowercase()
    ))
}

fn patch(state: &mut MockState, call: &ParsedCall) -> ProcessOutput {
    let [type_name, name] = call.positional.as_slice() else {
        return fail(1, "error: patch expects a type and a name");
    };
    let Some(body) = &call.patch_body else {
        return fail(1, "error: patch expects -p with a patch body");
    };
    let patch_value: Value = match serde_yaml::from_str(body) {
        Ok(value) => value,
        Err(err) => return fail(1, &format!("error: invalid patch: {err}")),
    };
    let key = (
        type_name.clone(),
        namespace_for(kind_of(type_name), call.namespace.clone()),
        name.clone(),
    );
    let Some(existing) = state.resources.get_mut(&key) else {
        return fail(
            1,
            &format!(
                "Error from server (NotFound): {} \"{name}\" not found",
                plural(kind_of(type_name))
            ),
        );
    };
    merge_values(existing, &patch_value);
    ok(&format!(
        "{}/{name} patched",
        kind_of(type_name).to_lowercase()
    ))
}

fn merge_values(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Mapping(base), Value::Mapping(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const CM: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\ndata:\n  mode: demo\n";

    #[tokio::test]
    async fn apply_then_get_round_trips() {
        let mock = MockKube::new();
        let out = mock
            .run("kubectl", &args(&["apply", "-n", "ns1", "-f", "-"]), Some(CM))
            .await
            .unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("configmap/cm serverside-applied"));

        let out = mock
            .run(
                "kubectl",
                &args(&["get", "ConfigMap", "cm", "-n", "ns1", "-o", "yaml"]),
                None,
            )
            .await
            .unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("mode: demo"));
    }

    #[tokio::test]
    async fn get_of_absent_resource_is_not_found() {
        let mock = MockKube::new();
        let out = mock
            .run("kubectl", &args(&["get", "ConfigMap", "missing"]), None)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("(NotFound)"));
        assert!(out.stderr.contains("configmaps \"missing\" not found"));
    }

    #[tokio::test]
    async fn create_of_existing_resource_already_exists() {
        let mock = MockKube::builder().seed("default", CM).build();
        let out = mock
            .run("kubectl", &args(&["create", "-f", "-"]), Some(CM))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("(AlreadyExists)"));
    }

    #[tokio::test]
    async fn delete_honors_ignore_not_found() {
        let mock = MockKube::new();
        let strict = mock
            .run("kubectl", &args(&["delete", "ConfigMap", "cm"]), None)
            .await
            .unwrap();
        assert_eq!(strict.exit_code, 1);

        let tolerant = mock
            .run(
                "kubectl",
                &args(&["delete", "ConfigMap", "cm", "--ignore-not-found"]),
                None,
            )
            .await
            .unwrap();
        assert!(tolerant.success());
    }

    #[tokio::test]
    async fn namespaces_are_cluster_scoped() {
        let mock = MockKube::new();
        let ns = "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: ns1\n";
        mock.run("kubectl", &args(&["apply", "-f", "-"]), Some(ns))
            .await
            .unwrap();
        let out = mock
            .run(
                "kubectl",
                &args(&["get", "Namespace", "ns1", "-n", "whatever"]),
                None,
            )
            .await
            .unwrap();
        assert!(out.success());
    }

    #[tokio::test]
    async fn injected_failure_fires_then_clears() {
        let mock = MockKube::builder()
            .fail("apply", "error: admission webhook denied the request")
            .build();
        let first = mock
            .run("kubectl", &args(&["apply", "-f", "-"]), Some(CM))
            .await
            .unwrap();
        assert_eq!(first.exit_code, 1);
        let second = mock
            .run("kubectl", &args(&["apply", "-f", "-"]), Some(CM))
            .await
            .unwrap();
        assert!(second.success());
    }

    #[tokio::test]
    async fn fail_after_skips_the_first_matching_calls() {
        let mock = MockKube::builder()
            .fail_after("apply", 1, "error: field is immutable")
            .build();
        let first = mock
            .run("kubectl", &args(&["apply", "-f", "-"]), Some(CM))
            .await
            .unwrap();
        assert!(first.success());
        let second = mock
            .run("kubectl", &args(&["apply", "-f", "-"]), Some(CM))
            .await
            .unwrap();
        assert_eq!(second.exit_code, 1);
        assert!(second.stderr.contains("immutable"));
    }

    #[tokio::test]
    async fn label_updates_metadata() {
        let mock = MockKube::builder().seed("default", CM).build();
        let out = mock
            .run(
                "kubectl",
                &args(&["label", "ConfigMap", "cm", "tier=backend"]),
                None,
            )
            .await
            .unwrap();
        assert!(out.success());

        let get = mock
            .run("kubectl", &args(&["get", "ConfigMap", "cm"]), None)
            .await
            .unwrap();
        assert!(get.stdout.contains("tier: backend"));
    }

    #[tokio::test]
    async fn status_apply_merges_status_into_existing_resource() {
        let mock = MockKube::builder().seed("default", CM).build();
        let with_status =
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\nstatus:\n  phase: Ready\n";
        let out = mock
            .run(
                "kubectl",
                &args(&["apply", "--server-side", "--subresource", "status", "-f", "-"]),
                Some(with_status),
            )
            .await
            .unwrap();
        assert!(out.success());

        let get = mock
            .run("kubectl", &args(&["get", "ConfigMap", "cm"]), None)
            .await
            .unwrap();
        assert!(get.stdout.contains("phase: Ready"));
        assert!(get.stdout.contains("mode: demo"), "spec data preserved");
    }
}
