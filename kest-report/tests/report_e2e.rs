//! Full pipeline: literal event stream → model → Markdown → ANSI.

use kest_common::{ErrorSummary, Event, RetryReason};
use kest_report::{
    parse_events, render_ansi, render_markdown, strip_ansi, Detail, Status, Theme,
};

const CONFIGMAP_YAML: &str =
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\ndata:\n  mode: demo\n";

/// The canonical apply-and-assert flow, as the engine records it.
fn apply_and_assert_events() -> Vec<Event> {
    vec![
        Event::ScenarioStart {
            name: "applies a configmap".into(),
        },
        Event::BddGiven {
            description: "an empty namespace".into(),
        },
        Event::ActionStart {
            description: "Apply Namespace".into(),
        },
        Event::CommandRun {
            cmd: "kubectl".into(),
            args: vec!["apply".into(), "--server-side".into(), "-f".into(), "-".into()],
            stdin: Some("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: kest-x2v9q\n".into()),
            stdin_language: Some("yaml".into()),
        },
        Event::CommandResult {
            exit_code: 0,
            stdout: "namespace/kest-x2v9q serverside-applied\n".into(),
            stderr: String::new(),
            stdout_language: None,
            stderr_language: None,
        },
        Event::ActionEnd {
            ok: true,
            error: None,
        },
        Event::BddWhen {
            description: "a configmap is applied".into(),
        },
        Event::ActionStart {
            description: "Apply ConfigMap cm".into(),
        },
        Event::CommandRun {
            cmd: "kubectl".into(),
            args: vec![
                "apply".into(),
                "--server-side".into(),
                "-n".into(),
                "kest-x2v9q".into(),
                "-f".into(),
                "-".into(),
            ],
            stdin: Some(CONFIGMAP_YAML.into()),
            stdin_language: Some("yaml".into()),
        },
        Event::CommandResult {
            exit_code: 0,
            stdout: "configmap/cm serverside-applied\n".into(),
            stderr: String::new(),
            stdout_language: None,
            stderr_language: None,
        },
        Event::ActionEnd {
            ok: true,
            error: None,
        },
        Event::BddThen {
            description: "it carries its data".into(),
        },
        Event::ActionStart {
            description: "Assert ConfigMap cm".into(),
        },
        Event::CommandRun {
            cmd: "kubectl".into(),
            args: vec![
                "get".into(),
                "ConfigMap".into(),
                "cm".into(),
                "-n".into(),
                "kest-x2v9q".into(),
                "-o".into(),
                "yaml".into(),
            ],
            stdin: None,
            stdin_language: None,
        },
        Event::CommandResult {
            exit_code: 0,
            stdout: CONFIGMAP_YAML.into(),
            stderr: String::new(),
            stdout_language: Some("yaml".into()),
            stderr_language: None,
        },
        Event::ActionEnd {
            ok: true,
            error: None,
        },
        Event::RevertingsStart,
        Event::ActionStart {
            description: "Delete ConfigMap cm".into(),
        },
        Event::CommandRun {
            cmd: "kubectl".into(),
            args: vec![
                "delete".into(),
                "ConfigMap".into(),
                "cm".into(),
                "--ignore-not-found".into(),
                "-n".into(),
                "kest-x2v9q".into(),
            ],
            stdin: None,
            stdin_language: None,
        },
        Event::CommandResult {
            exit_code: 0,
            stdout: "configmap \"cm\" deleted\n".into(),
            stderr: String::new(),
            stdout_language: None,
            stderr_language: None,
        },
        Event::ActionEnd {
            ok: true,
            error: None,
        },
        Event::ActionStart {
            description: "Delete Namespace kest-x2v9q".into(),
        },
        Event::CommandRun {
            cmd: "kubectl".into(),
            args: vec![
                "delete".into(),
                "Namespace".into(),
                "kest-x2v9q".into(),
                "--ignore-not-found".into(),
            ],
            stdin: None,
            stdin_language: None,
        },
        Event::CommandResult {
            exit_code: 0,
            stdout: "namespace \"kest-x2v9q\" deleted\n".into(),
            stderr: String::new(),
            stdout_language: None,
            stderr_language: None,
        },
        Event::ActionEnd {
            ok: true,
            error: None,
        },
        Event::RevertingsEnd,
        Event::ScenarioEnd,
    ]
}

#[test]
fn the_canonical_flow_parses_into_the_expected_model() {
    let report = parse_events(&apply_and_assert_events());
    assert_eq!(report.scenarios.len(), 1);
    let scenario = &report.scenarios[0];

    assert_eq!(scenario.name, "applies a configmap");
    assert_eq!(scenario.overview.len(), 3);
    assert!(scenario
        .overview
        .iter()
        .all(|item| item.status == Status::Success));

    assert_eq!(scenario.details.len(), 3);
    for (detail, keyword) in scenario.details.iter().zip(["Given", "When", "Then"]) {
        let Detail::Section(section) = detail else {
            panic!("expected a section");
        };
        assert_eq!(section.keyword, keyword);
        assert_eq!(section.actions.len(), 1);
    }

    assert_eq!(scenario.cleanup.len(), 2);
    assert_eq!(scenario.cleanup[0].action, "Delete ConfigMap cm");
    assert_eq!(scenario.cleanup[1].action, "Delete Namespace kest-x2v9q");
    assert!(!scenario.cleanup_skipped);
}

#[test]
fn the_canonical_flow_renders_the_expected_markdown() {
    let report = parse_events(&apply_and_assert_events());
    let markdown = render_markdown(&report);

    assert!(markdown.starts_with("# applies a configmap\n"));

    let overview_at = markdown.find("## Scenario Overview").unwrap();
    let details_at = markdown.find("## Scenario Details").unwrap();
    let cleanup_at = markdown.find("## Cleanup").unwrap();
    assert!(overview_at < details_at && details_at < cleanup_at);

    assert!(markdown.contains("| 1 | Apply Namespace | ✅ |"));
    assert!(markdown.contains("| 2 | Apply ConfigMap cm | ✅ |"));
    assert!(markdown.contains("| 3 | Assert ConfigMap cm | ✅ |"));

    assert!(markdown.contains("### Given: an empty namespace"));
    assert!(markdown.contains("### When: a configmap is applied"));
    assert!(markdown.contains("### Then: it carries its data"));

    assert!(markdown.contains(
        "kubectl apply --server-side -n kest-x2v9q -f - <<EOF\napiVersion: v1\nkind: ConfigMap"
    ));
    assert!(markdown.contains("| 1 | Delete ConfigMap cm | ✅ |"));
    assert!(markdown.contains("| 2 | Delete Namespace kest-x2v9q | ✅ |"));
    assert!(markdown.contains(
        "$ kubectl delete ConfigMap cm --ignore-not-found -n kest-x2v9q\nconfigmap \"cm\" deleted"
    ));
}

#[test]
fn ansi_rendering_strips_back_to_the_plain_report() {
    let report = parse_events(&apply_and_assert_events());
    let plain = render_markdown(&report);
    let ansi = render_ansi(&report, &Theme::default());

    assert_ne!(ansi, plain, "the default theme paints something");
    assert_eq!(strip_ansi(&ansi), plain);
}

#[test]
fn stdin_bodies_round_trip_through_placeholder_substitution() {
    let report = parse_events(&apply_and_assert_events());
    let ansi = render_ansi(&report, &Theme::default());
    let stripped = strip_ansi(&ansi);
    let body = CONFIGMAP_YAML.trim_end_matches('\n');
    assert!(stripped.contains(body), "stdin must survive byte-for-byte");
}

#[test]
fn failed_retried_actions_render_attempts_and_unwrapped_cause() {
    let timeout = ErrorSummary {
        name: None,
        message: "Timed out after 5s".into(),
        stack: None,
        cause: Some(Box::new(ErrorSummary::message(
            "Error from server (NotFound): configmaps \"missing\" not found",
        ))),
    };
    let events = vec![
        Event::ScenarioStart {
            name: "fails to find".into(),
        },
        Event::ActionStart {
            description: "Assert ConfigMap missing".into(),
        },
        Event::RetryStart,
        Event::RetryAttempt { attempt: 1 },
        Event::RetryAttempt { attempt: 2 },
        Event::RetryEnd {
            attempts: 2,
            success: false,
            reason: RetryReason::Timeout,
            error: None,
        },
        Event::ActionEnd {
            ok: false,
            error: Some(timeout),
        },
        Event::RevertingsStart,
        Event::RevertingsEnd,
        Event::ScenarioEnd,
    ];

    let markdown = render_markdown(&parse_events(&events));
    assert!(markdown.contains("| 1 | Assert ConfigMap missing | ❌ |"));
    assert!(markdown.contains("**❌ Assert ConfigMap missing** (Failed after 2 attempts)"));
    assert!(markdown.contains("```text\nError from server (NotFound)"));
    assert!(!markdown.contains("Timed out after"), "the wrapper is unwrapped");
}

#[test]
fn diff_errors_render_with_diff_highlighting() {
    let diff_message = "- mode: demo\n+ mode: prod";
    let events = vec![
        Event::ScenarioStart {
            name: "diff failure".into(),
        },
        Event::ActionStart {
            description: "Assert ConfigMap cm".into(),
        },
        Event::ActionEnd {
            ok: false,
            error: Some(ErrorSummary::message(diff_message)),
        },
        Event::RevertingsStart,
        Event::RevertingsEnd,
        Event::ScenarioEnd,
    ];

    let report = parse_events(&events);
    let markdown = render_markdown(&report);
    assert!(markdown.contains("```diff\n- mode: demo\n+ mode: prod\n```"));

    let theme = Theme::default();
    let ansi = render_ansi(&report, &theme);
    assert!(ansi.contains(&theme.diff_removed.paint("- mode: demo")));
    assert!(ansi.contains(&theme.diff_added.paint("+ mode: prod")));
    assert_eq!(strip_ansi(&ansi), markdown);
}

#[test]
fn stack_traces_render_in_a_trace_fence() {
    let mut summary = ErrorSummary::message("assertion failed");
    summary.stack = Some(
        "Error: assertion failed\n    at check (/no/such/file.rs:12:5)\n    at /no/such/other.rs:3:1\n"
            .into(),
    );
    let events = vec![
        Event::ScenarioStart {
            name: "stacked failure".into(),
        },
        Event::ActionStart {
            description: "Assert ConfigMap cm".into(),
        },
        Event::ActionEnd {
            ok: false,
            error: Some(summary),
        },
        Event::RevertingsStart,
        Event::RevertingsEnd,
        Event::ScenarioEnd,
    ];

    let report = parse_events(&events);
    let markdown = render_markdown(&report);
    assert!(markdown.contains("```trace\n"));
    assert!(markdown.contains("at check /no/such/file.rs:12:5"));
    assert!(markdown.contains("at /no/such/other.rs:3:1"));
    assert!(
        !markdown.contains("Error: assertion failed\n    at"),
        "stack header lines are stripped"
    );

    let ansi = render_ansi(&report, &Theme::default());
    assert_eq!(strip_ansi(&ansi), markdown);
}

#[test]
fn empty_scenarios_render_nothing_and_empty_streams_render_the_empty_string() {
    assert_eq!(render_markdown(&parse_events(&[])), "");

    let events = vec![
        Event::ScenarioStart {
            name: "nothing happens".into(),
        },
        Event::ScenarioEnd,
    ];
    assert_eq!(render_markdown(&parse_events(&events)), "");
}
