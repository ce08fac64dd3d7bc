//! Cleanup ordering: reverts run in exact reverse of registration.

mod common;

use common::{action_starts, assert_stream_invariants};
use kest::testing::{test_deps, MockKube};
use kest::{run_scenario_with, ScenarioOptions};
use kest_report::{parse_events, Status};

const CONFIGMAP: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n";
const DEPLOYMENT: &str =
    "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 1\n";
const SERVICE: &str = "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n";

#[tokio::test]
async fn reverts_run_newest_first_with_the_namespace_last() {
    let mock = MockKube::new();
    let deps = test_deps(mock.clone());
    let recorder = deps.recorder.clone();

    run_scenario_with(
        "creates a small stack",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            let ns = s.new_namespace(()).await?;
            ns.apply(CONFIGMAP).await?;
            ns.apply(DEPLOYMENT).await?;
            ns.apply(SERVICE).await?;
            Ok(())
        },
    )
    .await
    .unwrap();

    let events = recorder.events();
    assert_stream_invariants(&events);

    let starts = action_starts(&events);
    let cleanup: Vec<&String> = starts
        .iter()
        .filter(|name| name.starts_with("Delete "))
        .collect();
    assert_eq!(cleanup.len(), 4);
    assert_eq!(cleanup[0], "Delete Service web");
    assert_eq!(cleanup[1], "Delete Deployment web");
    assert_eq!(cleanup[2], "Delete ConfigMap settings");
    assert!(cleanup[3].starts_with("Delete Namespace kest-"));

    assert!(mock.names_of("ConfigMap").is_empty());
    assert!(mock.names_of("Deployment.v1.apps").is_empty());
    assert!(mock.names_of("Service").is_empty());
    assert!(mock.names_of("Namespace").is_empty());
}

#[tokio::test]
async fn cleanup_runs_even_when_the_body_fails_midway() {
    let mock = MockKube::new();
    let deps = test_deps(mock.clone());
    let recorder = deps.recorder.clone();

    let result = run_scenario_with(
        "fails after creating resources",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            let ns = s.new_namespace(()).await?;
            ns.apply(CONFIGMAP).await?;
            anyhow::bail!("the body gives up here")
        },
    )
    .await;

    assert!(result.is_err());
    let events = recorder.events();
    assert_stream_invariants(&events);

    let report = parse_events(&events);
    let scenario = &report.scenarios[0];
    assert_eq!(scenario.cleanup.len(), 2);
    assert!(scenario
        .cleanup
        .iter()
        .all(|item| item.status == Status::Success));
    assert!(mock.names_of("ConfigMap").is_empty());
    assert!(mock.names_of("Namespace").is_empty());
}

#[tokio::test]
async fn failed_revert_surfaces_but_still_closes_the_cleanup_bracket() {
    // The configmap delete is refused once; the drain stops there.
    let mock = MockKube::builder()
        .fail("delete", "Error from server (InternalError): etcd leader changed")
        .build();
    let deps = test_deps(mock.clone());
    let recorder = deps.recorder.clone();
    let reverting = deps.reverting.clone();

    let result = run_scenario_with(
        "hits a failing revert",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            let ns = s.new_namespace(()).await?;
            ns.apply(CONFIGMAP).await?;
            Ok(())
        },
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("etcd leader changed"));

    let events = recorder.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, kest_common::Event::RevertingsEnd)));

    // The failed callback is restored; the namespace revert never ran.
    assert_eq!(reverting.len(), 2);
    assert_eq!(mock.names_of("Namespace").len(), 1);

    let report = parse_events(&events);
    let scenario = &report.scenarios[0];
    assert_eq!(scenario.cleanup.len(), 1);
    assert_eq!(scenario.cleanup[0].status, Status::Failure);

    // A later drain resumes from the restored callback.
    reverting.revert(&recorder).await.unwrap();
    assert!(reverting.is_empty());
    assert!(mock.names_of("ConfigMap").is_empty());
    assert!(mock.names_of("Namespace").is_empty());
}

#[tokio::test]
async fn exec_reverts_participate_in_cleanup_ordering() {
    let mock = MockKube::new();
    let deps = test_deps(mock.clone());
    let recorder = deps.recorder.clone();

    run_scenario_with(
        "mixes exec and apply",
        deps,
        ScenarioOptions::default(),
        |s| async move {
            s.exec(
                kest::Exec::new("seed fixtures", |sh| async move {
                    sh.run("true").await?;
                    Ok(())
                })
                .with_revert(|sh| async move {
                    sh.run("true").await?;
                    Ok(())
                }),
            )
            .await?;
            s.apply(CONFIGMAP).await?;
            Ok(())
        },
    )
    .await
    .unwrap();

    let starts = action_starts(&recorder.events());
    assert_eq!(
        starts,
        vec![
            "Exec seed fixtures",
            "Apply ConfigMap settings",
            "Delete ConfigMap settings",
            "Revert seed fixtures",
        ]
    );
}
