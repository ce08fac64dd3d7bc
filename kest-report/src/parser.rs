//! Folds an event stream into the report model.
//!
//! The parser is a single linear pass: events are never re-read or
//! reordered, so the report is a pure function of the stream. Retried
//! actions collapse to their last attempt — `RetryAttempt` clears the
//! commands gathered so far, leaving exactly what a user would see if
//! they reran the final attempt.

use kest_common::{ErrorSummary, Event};

use crate::highlight::strip_ansi;
use crate::model::{
    ActionError, ActionReport, BddSection, CleanupCommand, CleanupItem, CommandReport, Detail,
    OverviewItem, Report, ScenarioReport, Status, Text,
};

/// Fold a recorded event stream into a [`Report`].
pub fn parse_events(events: &[Event]) -> Report {
    let mut fold = Fold::default();
    for event in events {
        fold.push(event);
    }
    fold.finish()
}

#[derive(Default)]
struct Fold {
    scenarios: Vec<ScenarioReport>,
    scenario: Option<ScenarioReport>,
    section: Option<BddSection>,
    action: Option<ActionReport>,
    in_cleanup: bool,
}

impl Fold {
    fn push(&mut self, event: &Event) {
        if let Some((keyword, description)) = event.bdd() {
            self.commit_action();
            self.commit_section();
            self.section = Some(BddSection {
                keyword: keyword.to_string(),
                description: description.to_string(),
                actions: Vec::new(),
            });
            return;
        }

        match event {
            Event::ScenarioStart { name } => {
                self.flush_scenario();
                self.scenario = Some(ScenarioReport {
                    name: name.clone(),
                    ..ScenarioReport::default()
                });
            }

            Event::ActionStart { description } => {
                if self.in_cleanup {
                    if let Some(scenario) = &mut self.scenario {
                        scenario.cleanup.push(CleanupItem {
                            action: description.clone(),
                            status: Status::Success,
                            command: CleanupCommand::default(),
                        });
                    }
                } else {
                    self.commit_action();
                    self.action = Some(ActionReport {
                        name: description.clone(),
                        ..ActionReport::default()
                    });
                    if let Some(scenario) = &mut self.scenario {
                        scenario.overview.push(OverviewItem {
                            name: description.clone(),
                            status: Status::Pending,
                        });
                    }
                }
            }

            Event::CommandRun {
                cmd,
                args,
                stdin,
                stdin_language,
            } => {
                if self.in_cleanup {
                    if let Some(item) = self.current_cleanup() {
                        item.command = CleanupCommand {
                            cmd: cmd.clone(),
                            args: args.clone(),
                            output: String::new(),
                        };
                    }
                } else if let Some(action) = &mut self.action {
                    action.commands.push(CommandReport {
                        cmd: cmd.clone(),
                        args: args.clone(),
                        stdin: stdin
                            .as_ref()
                            .map(|value| Text::tagged(value.clone(), stdin_language.clone())),
                        stdout: None,
                        stderr: None,
                    });
                }
            }

            Event::CommandResult {
                stdout,
                stderr,
                stdout_language,
                stderr_language,
                ..
            } => {
                if self.in_cleanup {
                    if let Some(item) = self.current_cleanup() {
                        item.command.output = combined_output(stdout, stderr);
                    }
                } else if let Some(command) =
                    self.action.as_mut().and_then(|a| a.commands.last_mut())
                {
                    command.stdout = non_empty(stdout)
                        .map(|value| Text::tagged(value, stdout_language.clone()));
                    command.stderr = non_empty(stderr)
                        .map(|value| Text::tagged(value, stderr_language.clone()));
                }
            }

            Event::RetryStart => {}

            Event::RetryAttempt { .. } => {
                // Collapse to the last attempt.
                if let Some(action) = &mut self.action {
                    action.commands.clear();
                }
            }

            Event::RetryEnd { attempts, .. } => {
                if let Some(action) = &mut self.action {
                    action.attempts = Some(*attempts);
                }
            }

            Event::ActionEnd { ok, error } => {
                if self.in_cleanup {
                    if let Some(item) = self.current_cleanup() {
                        item.status = if *ok { Status::Success } else { Status::Failure };
                    }
                } else {
                    if let Some(item) = self
                        .scenario
                        .as_mut()
                        .and_then(|s| s.overview.last_mut())
                    {
                        item.status = if *ok { Status::Success } else { Status::Failure };
                    }
                    if let (Some(action), Some(summary)) = (&mut self.action, error) {
                        action.error = Some(action_error(summary));
                    }
                    self.commit_action();
                }
            }

            Event::RevertingsStart => {
                self.commit_action();
                self.commit_section();
                self.in_cleanup = true;
            }

            Event::RevertingsEnd => {
                self.in_cleanup = false;
            }

            Event::RevertingsSkipped => {
                if let Some(scenario) = &mut self.scenario {
                    scenario.cleanup_skipped = true;
                }
            }

            Event::ScenarioEnd => {
                self.commit_action();
                self.commit_section();
                self.in_cleanup = false;
            }

            // BDD events are handled above.
            _ => {}
        }
    }

    fn finish(mut self) -> Report {
        self.flush_scenario();
        Report {
            scenarios: self.scenarios,
        }
    }

    fn current_cleanup(&mut self) -> Option<&mut CleanupItem> {
        self.scenario.as_mut().and_then(|s| s.cleanup.last_mut())
    }

    fn commit_action(&mut self) {
        if let Some(action) = self.action.take() {
            if let Some(section) = &mut self.section {
                section.actions.push(action);
            } else if let Some(scenario) = &mut self.scenario {
                scenario.details.push(Detail::Action(action));
            }
        }
    }

    fn commit_section(&mut self) {
        if let Some(section) = self.section.take() {
            if let Some(scenario) = &mut self.scenario {
                scenario.details.push(Detail::Section(section));
            }
        }
    }

    fn flush_scenario(&mut self) {
        self.commit_action();
        self.commit_section();
        self.in_cleanup = false;
        if let Some(scenario) = self.scenario.take() {
            self.scenarios.push(scenario);
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn combined_output(stdout: &str, stderr: &str) -> String {
    let mut parts = Vec::new();
    if !stdout.trim().is_empty() {
        parts.push(stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        parts.push(stderr.trim_end());
    }
    parts.join("\n")
}

/// Build the reported error for a failed action.
///
/// A retry timeout wraps the last underlying failure; the report surfaces
/// the underlying diagnostic instead of the wrapper, taking both message
/// and stack from the cause when one exists.
fn action_error(summary: &ErrorSummary) -> ActionError {
    let effective: &ErrorSummary = if summary.message.starts_with("Timed out after ") {
        match &summary.cause {
            Some(cause) if !cause.message.is_empty() => cause,
            _ => summary,
        }
    } else {
        summary
    };

    let language = if is_diff_message(&strip_ansi(&effective.message)) {
        "diff"
    } else {
        "text"
    };
    ActionError {
        message: Text::tagged(effective.message.clone(), Some(language.to_string())),
        stack: effective
            .stack
            .clone()
            .or_else(|| summary.stack.clone()),
    }
}

/// A message is diff-like when it has both an added and a removed line,
/// excluding `+++`/`---` file headers.
fn is_diff_message(message: &str) -> bool {
    let mut has_added = false;
    let mut has_removed = false;
    for line in message.lines() {
        if line.starts_with('+') && !line.starts_with("++") {
            has_added = true;
        }
        if line.starts_with('-') && !line.starts_with("--") {
            has_removed = true;
        }
    }
    has_added && has_removed
}
