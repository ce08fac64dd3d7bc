//! Report pipeline for KEST event streams.
//!
//! Three stages, each a pure function of its input:
//!
//! 1. [`parse_events`] folds a recorded event stream into the [`model`]
//!    in a single pass.
//! 2. [`render_markdown`] turns the model into a plain Markdown report.
//! 3. [`render_ansi`] colorizes that Markdown for terminals; stripping
//!    the escape codes recovers the plain output byte-for-byte.

pub mod highlight;
pub mod model;
pub mod parser;
pub mod render;
pub mod theme;
pub mod trace;
pub mod workspace;

pub use highlight::{render_ansi, strip_ansi};
pub use model::{
    ActionError, ActionReport, BddSection, CleanupCommand, CleanupItem, CommandReport, Detail,
    OverviewItem, Report, ScenarioReport, Status, Text,
};
pub use parser::parse_events;
pub use render::render_markdown;
pub use theme::{Style, Theme};
pub use trace::{parse_frames, render_trace, user_frame, Frame, TraceOptions};
pub use workspace::{find_workspace_root, workspace_root};
