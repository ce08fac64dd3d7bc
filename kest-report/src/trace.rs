//! Stack-trace rendering with source context.
//!
//! Stacks arrive as raw text; frames are parsed out of `at …` lines and
//! anything else (header lines, snippet code, diff output) is ignored.
//! When a user frame can be tied to a readable file, the rendered trace
//! leads with a few lines of source ending at the frame's line and a
//! caret under the failing column; the frame list follows either way.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::workspace::workspace_root;

/// One parsed stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub func: Option<String>,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// Settings for user-frame selection and file resolution.
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
    /// Root for resolving relative frame paths and classifying
    /// workspace-relative frames.
    pub workspace_root: Option<PathBuf>,
    /// Frames under this workspace-relative prefix belong to the engine
    /// itself and are skipped when picking the user frame.
    pub library_prefix: Option<String>,
}

impl TraceOptions {
    /// Options bound to the discovered workspace root and this engine's
    /// own crate prefix.
    pub fn discover() -> Self {
        Self {
            workspace_root: workspace_root().map(Path::to_path_buf),
            library_prefix: Some("kest".to_string()),
        }
    }
}

/// Number of context lines shown above (and including) the target line.
const CONTEXT_LINES: u32 = 6;

fn frame_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // at func (file:line:col)
            Regex::new(r"^\s*at\s+(?:async\s+)?(.+?)\s+\((.+):(\d+):(\d+)\)\s*$")
                .expect("static regex"),
            // at (file:line:col)
            Regex::new(r"^\s*at\s+(?:async\s+)?\((.+):(\d+):(\d+)\)\s*$").expect("static regex"),
            // at file:line:col
            Regex::new(r"^\s*at\s+(?:async\s+)?(.+):(\d+):(\d+)\s*$").expect("static regex"),
        ]
    })
}

/// Parse all recognizable frames out of a raw stack string.
pub fn parse_frames(stack: &str) -> Vec<Frame> {
    let [with_func, parens_only, bare] = frame_patterns();
    let mut frames = Vec::new();

    for line in stack.lines() {
        if let Some(caps) = with_func.captures(line) {
            frames.push(Frame {
                func: Some(caps[1].to_string()),
                file: caps[2].to_string(),
                line: caps[3].parse().unwrap_or(0),
                column: caps[4].parse().unwrap_or(0),
            });
        } else if let Some(caps) = parens_only.captures(line) {
            frames.push(Frame {
                func: None,
                file: caps[1].to_string(),
                line: caps[2].parse().unwrap_or(0),
                column: caps[3].parse().unwrap_or(0),
            });
        } else if let Some(caps) = bare.captures(line) {
            frames.push(Frame {
                func: None,
                file: caps[1].to_string(),
                line: caps[2].parse().unwrap_or(0),
                column: caps[3].parse().unwrap_or(0),
            });
        }
    }
    frames
}

/// The first frame that points at user code.
pub fn user_frame<'a>(frames: &'a [Frame], options: &TraceOptions) -> Option<&'a Frame> {
    frames.iter().find(|frame| {
        let file = frame.file.as_str();
        if file == "unknown" || file.starts_with('<') || file.starts_with("native:") {
            return false;
        }
        if file.contains("/node_modules/") {
            return false;
        }
        if let (Some(root), Some(prefix)) = (&options.workspace_root, &options.library_prefix) {
            let relative = Path::new(file)
                .strip_prefix(root)
                .ok()
                .or_else(|| Path::new(file).is_relative().then(|| Path::new(file)));
            if let Some(relative) = relative {
                if relative.starts_with(prefix) {
                    return false;
                }
            }
        }
        true
    })
}

/// Render a raw stack: source context for the user frame when its file
/// is readable, then one `at …` line per frame. Header lines of the
/// original stack do not survive. Returns an empty string when the
/// stack contains no recognizable frames.
pub fn render_trace(stack: &str, options: &TraceOptions) -> String {
    let frames = parse_frames(stack);
    if frames.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    if let Some(frame) = user_frame(&frames, options) {
        if let Some(context) = source_context(frame, options) {
            out.push_str(&context);
            out.push('\n');
        }
    }

    for frame in &frames {
        match &frame.func {
            Some(func) => out.push_str(&format!(
                "at {func} {}:{}:{}\n",
                frame.file, frame.line, frame.column
            )),
            None => out.push_str(&format!(
                "at {}:{}:{}\n",
                frame.file, frame.line, frame.column
            )),
        }
    }
    out
}

fn source_context(frame: &Frame, options: &TraceOptions) -> Option<String> {
    let path = Path::new(&frame.file);
    let resolved: PathBuf = if path.is_relative() {
        options.workspace_root.as_ref()?.join(path)
    } else {
        path.to_path_buf()
    };
    let contents = std::fs::read_to_string(resolved).ok()?;
    let lines: Vec<&str> = contents.lines().collect();

    let target = frame.line;
    if target == 0 || target as usize > lines.len() {
        return None;
    }
    let first = target.saturating_sub(CONTEXT_LINES - 1).max(1);
    let gutter = target.to_string().len();

    let mut out = String::new();
    for number in first..=target {
        let code = lines[(number - 1) as usize];
        out.push_str(&format!("{number:>gutter$} | {code}\n"));
    }
    let caret_offset = (frame.column.max(1) - 1) as usize;
    out.push_str(&format!(
        "{} | {}^",
        " ".repeat(gutter),
        " ".repeat(caret_offset)
    ));
    Some(out)
}
