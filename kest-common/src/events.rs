//! The append-only event vocabulary recorded during a scenario run.
//!
//! Events are immutable records in program order. The reporter derives the
//! whole report from this stream alone, so the set is closed and every
//! payload is serializable. Stream invariants (balanced action brackets,
//! retry brackets only inside actions, cleanup events last) are enforced
//! by the engine and asserted in its integration tests.

use serde::{Deserialize, Serialize};

use crate::error::ErrorSummary;

/// Why a retry loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    /// An attempt succeeded before the deadline.
    Success,
    /// The time budget ran out.
    Timeout,
}

/// One record in a scenario's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    ScenarioStart {
        name: String,
    },
    ScenarioEnd,

    BddGiven {
        description: String,
    },
    BddWhen {
        description: String,
    },
    BddThen {
        description: String,
    },
    BddAnd {
        description: String,
    },
    BddBut {
        description: String,
    },

    ActionStart {
        description: String,
    },
    ActionEnd {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorSummary>,
    },

    CommandRun {
        cmd: String,
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdin: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdin_language: Option<String>,
    },
    CommandResult {
        exit_code: i32,
        stdout: String,
        stderr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdout_language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stderr_language: Option<String>,
    },

    RetryStart,
    RetryAttempt {
        attempt: u32,
    },
    RetryEnd {
        attempts: u32,
        success: bool,
        reason: RetryReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorSummary>,
    },

    RevertingsStart,
    RevertingsEnd,
    RevertingsSkipped,
}

impl Event {
    /// The BDD keyword and description when this is an annotation event.
    pub fn bdd(&self) -> Option<(&'static str, &str)> {
        match self {
            Event::BddGiven { description } => Some(("Given", description)),
            Event::BddWhen { description } => Some(("When", description)),
            Event::BddThen { description } => Some(("Then", description)),
            Event::BddAnd { description } => Some(("And", description)),
            Event::BddBut { description } => Some(("But", description)),
            _ => None,
        }
    }
}

/// Serialize an event stream as YAML, for the `KEST_SHOW_EVENTS` dump.
pub fn events_to_yaml(events: &[Event]) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_tag() {
        let event = Event::ScenarioStart {
            name: "applies a configmap".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "scenario_start");
        assert_eq!(json["name"], "applies a configmap");
    }

    #[test]
    fn unit_variants_round_trip() {
        for event in [
            Event::ScenarioEnd,
            Event::RetryStart,
            Event::RevertingsStart,
            Event::RevertingsEnd,
            Event::RevertingsSkipped,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            let back: Event = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn action_end_omits_absent_error() {
        let event = Event::ActionEnd {
            ok: true,
            error: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"action_end","ok":true}"#);
    }

    #[test]
    fn bdd_accessor_covers_all_keywords() {
        let cases = [
            (
                Event::BddGiven {
                    description: "a".into(),
                },
                "Given",
            ),
            (
                Event::BddWhen {
                    description: "b".into(),
                },
                "When",
            ),
            (
                Event::BddThen {
                    description: "c".into(),
                },
                "Then",
            ),
            (
                Event::BddAnd {
                    description: "d".into(),
                },
                "And",
            ),
            (
                Event::BddBut {
                    description: "e".into(),
                },
                "But",
            ),
        ];
        for (event, keyword) in cases {
            assert_eq!(event.bdd().unwrap().0, keyword);
        }
        assert!(Event::ScenarioEnd.bdd().is_none());
    }

    #[test]
    fn events_dump_as_yaml_sequence() {
        let events = vec![
            Event::ScenarioStart {
                name: "demo".into(),
            },
            Event::ScenarioEnd,
        ];
        let yaml = events_to_yaml(&events).unwrap();
        assert!(yaml.contains("event: scenario_start"));
        assert!(yaml.contains("event: scenario_end"));
    }
}
