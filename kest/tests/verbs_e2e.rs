//! Coverage for the remaining scenario verbs: status applies, labels,
//! explicit deletes, list assertions and cluster-bound views.

mod common;

use common::{action_starts, assert_stream_invariants};
use kest::testing::{test_deps, MockKube};
use kest::{run_scenario_with, ClusterRef, ResourceRef, ScenarioOptions};
use kest_common::Event;
use std::collections::BTreeMap;

const CONFIGMAP: &str =
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\ndata:\n  mode: demo\n";
const CONFIGMAP_STATUS: &str =
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\nstatus:\n  phase: Ready\n";

#[tokio::test]
async fn apply_status_is_one_way_and_registers_no_revert() {
    let mock = MockKube::new();
    let deps = test_deps(mock.clone());
    let recorder = deps.recorder.clone();

    run_scenario_with(
        "writes a status subresource",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            s.apply(CONFIGMAP).await?;
            s.apply_status(CONFIGMAP_STATUS).await?;
            s.assert(ResourceRef::new("v1", "ConfigMap", "cm"), |cm| {
                anyhow::ensure!(cm["status"]["phase"].as_str() == Some("Ready"));
                anyhow::ensure!(cm["data"]["mode"].as_str() == Some("demo"));
                Ok(())
            })
            .await?;
            Ok(())
        },
    )
    .await
    .unwrap();

    let events = recorder.events();
    assert_stream_invariants(&events);

    let starts = action_starts(&events);
    assert_eq!(
        starts,
        vec![
            "Apply ConfigMap cm",
            "Apply status of ConfigMap cm",
            "Assert ConfigMap cm",
            "Delete ConfigMap cm",
        ],
        "only the apply registered a revert"
    );
}

#[tokio::test]
async fn apply_status_requires_a_status_section() {
    let mock = MockKube::new();
    let deps = test_deps(mock);
    let recorder = deps.recorder.clone();

    let result = run_scenario_with(
        "rejects a statusless status apply",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            s.apply_status(CONFIGMAP).await?;
            Ok(())
        },
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("must include a status section"));

    // Invalid input fails before any action event is recorded.
    assert!(action_starts(&recorder.events()).is_empty());
}

#[tokio::test]
async fn label_and_explicit_delete_round_trip() {
    let mock = MockKube::new();
    let deps = test_deps(mock.clone());

    run_scenario_with(
        "labels then deletes",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            s.apply(CONFIGMAP).await?;

            let mut labels = BTreeMap::new();
            labels.insert("tier".to_string(), Some("backend".to_string()));
            let target = ResourceRef::new("v1", "ConfigMap", "cm");
            s.label(target.clone(), labels, false).await?;

            s.assert(target.clone(), |cm| {
                anyhow::ensure!(
                    cm["metadata"]["labels"]["tier"].as_str() == Some("backend")
                );
                Ok(())
            })
            .await?;

            let mut removal = BTreeMap::new();
            removal.insert("tier".to_string(), None);
            s.label(target.clone(), removal, false).await?;

            s.delete(target.clone()).await?;
            s.assert_absence(target).await?;
            Ok(())
        },
    )
    .await
    .unwrap();

    // The registered revert tolerated the already-deleted resource.
    assert!(mock.names_of("ConfigMap").is_empty());
}

#[tokio::test]
async fn assert_absence_fails_on_presence_and_reraises_other_errors() {
    use kest::RetryOptions;
    use kest_common::DurationMs;

    let fast = RetryOptions::default()
        .with_timeout(DurationMs::from_millis(200))
        .with_interval(DurationMs::from_millis(40));

    // Present resource: the assertion must keep failing until timeout.
    let mock = MockKube::builder().seed("default", CONFIGMAP).build();
    let deps = test_deps(mock);
    let result = run_scenario_with(
        "expects absence of a present resource",
        deps,
        ScenarioOptions::default(),
        move |s| async move {
            s.with_options(fast)
                .assert_absence(ResourceRef::new("v1", "ConfigMap", "cm"))
                .await
        },
    )
    .await;
    let err = result.unwrap_err();
    assert!(err
        .chain()
        .last()
        .unwrap()
        .to_string()
        .contains("to be absent, but it exists"));

    // A non-NotFound error is re-raised, not consumed.
    let mock = MockKube::builder()
        .fail_times(
            "get",
            u32::MAX,
            "Error from server (Forbidden): configmaps \"cm\" is forbidden",
        )
        .build();
    let deps = test_deps(mock);
    let result = run_scenario_with(
        "hits a forbidden get",
        deps,
        ScenarioOptions::default(),
        move |s| async move {
            s.with_options(fast)
                .assert_absence(ResourceRef::new("v1", "ConfigMap", "cm"))
                .await
        },
    )
    .await;
    let err = result.unwrap_err();
    assert!(err.chain().last().unwrap().to_string().contains("(Forbidden)"));
}

#[tokio::test]
async fn list_assertions_verify_kind_and_cardinality() {
    let other = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: other\ndata:\n  mode: x\n";
    let mock = MockKube::builder()
        .seed("default", CONFIGMAP)
        .seed("default", other)
        .build();
    let deps = test_deps(mock);

    run_scenario_with(
        "lists configmaps",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            s.assert_list("v1", "ConfigMap", |items| {
                anyhow::ensure!(items.len() == 2, "expected 2 items, got {}", items.len());
                Ok(())
            })
            .await?;

            s.assert_one_where(
                "v1",
                "ConfigMap",
                |item| item["metadata"]["name"].as_str() == Some("cm"),
                |cm| {
                    anyhow::ensure!(cm["data"]["mode"].as_str() == Some("demo"));
                    Ok(())
                },
            )
            .await?;
            Ok(())
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn cluster_views_carry_their_context_on_every_command() {
    let mock = MockKube::new();
    let deps = test_deps(mock);
    let recorder = deps.recorder.clone();

    run_scenario_with(
        "targets another cluster",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            let other = s.use_cluster(&ClusterRef {
                context: Some("kind-other".to_string()),
                kubeconfig: Some("/tmp/other-kubeconfig".to_string()),
            });
            let ns = other.new_namespace(()).await?;
            ns.apply(CONFIGMAP).await?;
            Ok(())
        },
    )
    .await
    .unwrap();

    let command_args: Vec<Vec<String>> = recorder
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::CommandRun { args, .. } => Some(args.clone()),
            _ => None,
        })
        .collect();
    assert!(!command_args.is_empty());
    for args in &command_args {
        assert!(
            args.windows(2)
                .any(|w| w[0] == "--context" && w[1] == "kind-other"),
            "missing context in {args:?}"
        );
        assert!(
            args.windows(2)
                .any(|w| w[0] == "--kubeconfig" && w[1] == "/tmp/other-kubeconfig"),
            "missing kubeconfig in {args:?}"
        );
    }

    // The configmap apply on the namespaced view is bound to both.
    let last = command_args
        .iter()
        .filter(|args| args.first().map(String::as_str) == Some("apply"))
        .next_back()
        .unwrap();
    assert!(last.windows(2).any(|w| w[0] == "-n" && w[1].starts_with("kest-")));
}
