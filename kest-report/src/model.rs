//! The report data model.
//!
//! A [`Report`] is derived, never source-of-truth: the event stream alone
//! determines it. Everything is serializable so callers can persist or
//! post-process reports without going through the Markdown renderer.

use serde::Serialize;

/// Execution status of an action, as shown in the overview tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Success,
    Failure,
}

impl Status {
    pub fn emoji(self) -> &'static str {
        match self {
            Status::Pending => "⏳",
            Status::Success => "✅",
            Status::Failure => "❌",
        }
    }
}

/// A text payload with an optional syntax-highlighting language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Text {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Text {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
        }
    }

    pub fn tagged(value: impl Into<String>, language: Option<String>) -> Self {
        Self {
            value: value.into(),
            language,
        }
    }
}

/// One row of the scenario overview table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewItem {
    pub name: String,
    pub status: Status,
}

/// One command executed by an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandReport {
    pub cmd: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<Text>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<Text>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<Text>,
}

/// The final error of a failed action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionError {
    pub message: Text,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// One executed action: its commands (last attempt only) and outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    pub commands: Vec<CommandReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

/// A Given/When/Then grouping of actions, for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BddSection {
    pub keyword: String,
    pub description: String,
    pub actions: Vec<ActionReport>,
}

/// An entry in the scenario details: either a BDD section or a
/// standalone action recorded before any section opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Detail {
    Section(BddSection),
    Action(ActionReport),
}

/// The command behind one cleanup row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupCommand {
    pub cmd: String,
    pub args: Vec<String>,
    pub output: String,
}

/// One row of the cleanup table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupItem {
    pub action: String,
    pub status: Status,
    pub command: CleanupCommand,
}

/// Everything recorded for one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub overview: Vec<OverviewItem>,
    pub details: Vec<Detail>,
    pub cleanup: Vec<CleanupItem>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cleanup_skipped: bool,
}

impl ScenarioReport {
    /// A scenario with no actions and no sections renders nothing.
    pub fn is_empty(&self) -> bool {
        self.overview.is_empty()
            && self.details.is_empty()
            && self.cleanup.is_empty()
            && !self.cleanup_skipped
    }
}

/// The whole report: one entry per scenario in the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub scenarios: Vec<ScenarioReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_emojis() {
        assert_eq!(Status::Pending.emoji(), "⏳");
        assert_eq!(Status::Success.emoji(), "✅");
        assert_eq!(Status::Failure.emoji(), "❌");
    }

    #[test]
    fn empty_scenario_detection() {
        let mut scenario = ScenarioReport::default();
        assert!(scenario.is_empty());

        scenario.cleanup_skipped = true;
        assert!(!scenario.is_empty());
    }
}
