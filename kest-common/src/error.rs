//! Error summaries carried inside recorded events.
//!
//! An [`ErrorSummary`] is the serializable shadow of an `anyhow::Error`:
//! the display message, an optional rendered backtrace, and the source
//! chain folded into nested causes. Events carry summaries rather than
//! live errors so the stream stays cloneable and serializable.

use serde::{Deserialize, Serialize};

/// Serializable snapshot of an error and its cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Error type name, when one is known (e.g. a panic or a named port error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display message of the error.
    pub message: String,
    /// Rendered backtrace, when one was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// The error's source, summarized recursively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorSummary>>,
}

impl ErrorSummary {
    /// Summary with just a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Fold an `anyhow::Error` and its source chain into a summary tree.
    ///
    /// The backtrace is attached to the outermost summary only; anyhow
    /// captures a single trace per error, not one per context layer.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let stack = {
            let backtrace = err.backtrace();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                Some(backtrace.to_string())
            } else {
                None
            }
        };

        let mut layers: Vec<ErrorSummary> = err
            .chain()
            .map(|source| ErrorSummary::message(source.to_string()))
            .collect();

        let mut folded: Option<Box<ErrorSummary>> = None;
        while let Some(mut layer) = layers.pop() {
            layer.cause = folded;
            folded = Some(Box::new(layer));
        }

        let mut summary = folded
            .map(|boxed| *boxed)
            .unwrap_or_else(|| ErrorSummary::message(err.to_string()));
        summary.stack = stack;
        summary
    }

    /// The deepest cause in the chain (or the summary itself).
    pub fn root_cause(&self) -> &ErrorSummary {
        let mut current = self;
        while let Some(cause) = &current.cause {
            current = cause;
        }
        current
    }
}

impl std::fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
