//! Shared helpers for scenario integration tests.

#![allow(dead_code)]

use kest_common::Event;

/// Compact kind names for asserting on event sequences.
pub fn kinds(events: &[Event]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            Event::ScenarioStart { .. } => "scenario_start",
            Event::ScenarioEnd => "scenario_end",
            Event::BddGiven { .. } => "given",
            Event::BddWhen { .. } => "when",
            Event::BddThen { .. } => "then",
            Event::BddAnd { .. } => "and",
            Event::BddBut { .. } => "but",
            Event::ActionStart { .. } => "action_start",
            Event::ActionEnd { .. } => "action_end",
            Event::CommandRun { .. } => "command_run",
            Event::CommandResult { .. } => "command_result",
            Event::RetryStart => "retry_start",
            Event::RetryAttempt { .. } => "retry_attempt",
            Event::RetryEnd { .. } => "retry_end",
            Event::RevertingsStart => "revertings_start",
            Event::RevertingsEnd => "revertings_end",
            Event::RevertingsSkipped => "revertings_skipped",
        })
        .collect()
}

/// Descriptions of every `ActionStart`, in order.
pub fn action_starts(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::ActionStart { description } => Some(description.clone()),
            _ => None,
        })
        .collect()
}

/// Check the structural invariants every recorded stream must satisfy.
pub fn assert_stream_invariants(events: &[Event]) {
    assert!(
        matches!(events.first(), Some(Event::ScenarioStart { .. })),
        "stream must start with ScenarioStart"
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::ScenarioEnd))
            .count(),
        1,
        "exactly one ScenarioEnd"
    );

    let mut action_open = false;
    let mut saw_cleanup_marker = false;
    for event in events {
        match event {
            Event::ActionStart { .. } => {
                assert!(!action_open, "actions must not nest");
                action_open = true;
            }
            Event::ActionEnd { .. } => {
                assert!(action_open, "ActionEnd without ActionStart");
                action_open = false;
            }
            Event::RetryStart | Event::RetryAttempt { .. } | Event::RetryEnd { .. } => {
                assert!(action_open, "retry events only inside actions");
            }
            Event::RevertingsStart | Event::RevertingsSkipped => {
                saw_cleanup_marker = true;
            }
            _ => {}
        }
    }
    assert!(!action_open, "actions must be balanced");
    assert!(
        saw_cleanup_marker,
        "every finalized scenario has a cleanup phase or an explicit skip"
    );
}
