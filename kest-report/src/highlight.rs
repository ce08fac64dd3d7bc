//! ANSI colorization of the rendered report.
//!
//! The colorized report is the plain Markdown with SGR sequences wrapped
//! around tokens: headings, table rows, fences, and the contents of code
//! fences highlighted per their declared language. Heredoc stdin bodies
//! are highlighted independently of the surrounding Markdown and spliced
//! in via opaque placeholder tokens, so their text round-trips exactly.
//!
//! Two laws hold for any theme and any report:
//! - `strip_ansi(render_ansi(r)) == render_markdown(r)` byte-for-byte
//! - stdin bodies survive the placeholder substitution unchanged

use std::sync::OnceLock;

use regex::Regex;

use crate::model::Report;
use crate::render::{render_internal, render_markdown};
use crate::theme::Theme;

/// Remove SGR escape sequences.
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new("\x1b\\[[0-9;]*m").expect("static regex"));
    re.replace_all(text, "").into_owned()
}

/// Render the report as ANSI-colorized Markdown.
pub fn render_ansi(report: &Report, theme: &Theme) -> String {
    let rendered = render_internal(report, true);
    let mut out = highlight_markdown(&rendered.text, theme);
    for block in &rendered.stdin_blocks {
        let language = block.text.language.as_deref().unwrap_or("");
        let highlighted = highlight_code(&block.text.value, language, theme);
        out = out.replace(&block.token, &highlighted);
    }
    debug_assert_eq!(strip_ansi(&out), render_markdown(report));
    out
}

/// Highlight Markdown line by line, fence contents per their language.
fn highlight_markdown(text: &str, theme: &Theme) -> String {
    let mut fence_language: Option<String> = None;
    let mut out_lines = Vec::new();

    for line in text.split('\n') {
        let styled = match &fence_language {
            None => {
                if let Some(language) = line.strip_prefix("```") {
                    fence_language = Some(language.to_string());
                    theme.fence.paint(line)
                } else if line.starts_with('#') {
                    theme.heading.paint(line)
                } else if line.starts_with('|') {
                    theme.table.paint(line)
                } else if line.starts_with("**") {
                    theme.bold.paint(line)
                } else {
                    line.to_string()
                }
            }
            Some(language) => {
                if line == "```" {
                    fence_language = None;
                    theme.fence.paint(line)
                } else if line.contains('\u{e000}') {
                    // Placeholder tokens are replaced after highlighting;
                    // leave the line untouched so they stay findable.
                    line.to_string()
                } else {
                    highlight_code_line(line, language, theme)
                }
            }
        };
        out_lines.push(styled);
    }
    out_lines.join("\n")
}

/// Highlight a standalone block of code by language.
fn highlight_code(text: &str, language: &str, theme: &Theme) -> String {
    text.split('\n')
        .map(|line| highlight_code_line(line, language, theme))
        .collect::<Vec<_>>()
        .join("\n")
}

fn highlight_code_line(line: &str, language: &str, theme: &Theme) -> String {
    match language {
        "yaml" => highlight_yaml_line(line, theme),
        "shell" => highlight_shell_line(line, theme),
        "shellsession" => highlight_shellsession_line(line, theme),
        "diff" => highlight_diff_line(line, theme),
        "trace" => highlight_trace_line(line, theme),
        _ => line.to_string(),
    }
}

fn highlight_yaml_line(line: &str, theme: &Theme) -> String {
    if let Some(colon) = line.find(':') {
        let (key, rest) = line.split_at(colon);
        if !key.trim().is_empty() && !key.trim().starts_with('#') {
            return format!("{}{rest}", theme.yaml_key.paint(key));
        }
    }
    line.to_string()
}

fn highlight_shell_line(line: &str, theme: &Theme) -> String {
    match line.split_once(' ') {
        Some((command, rest)) if !command.is_empty() => {
            format!("{} {rest}", theme.shell_command.paint(command))
        }
        _ => theme.shell_command.paint(line),
    }
}

fn highlight_shellsession_line(line: &str, theme: &Theme) -> String {
    if let Some(command) = line.strip_prefix("$ ") {
        format!(
            "{} {}",
            theme.shell_prompt.paint("$"),
            theme.shell_command.paint(command)
        )
    } else {
        theme.muted.paint(line)
    }
}

fn highlight_diff_line(line: &str, theme: &Theme) -> String {
    if line.starts_with("@@") {
        theme.diff_hunk.paint(line)
    } else if line.starts_with('+') {
        theme.diff_added.paint(line)
    } else if line.starts_with('-') {
        theme.diff_removed.paint(line)
    } else {
        line.to_string()
    }
}

fn highlight_trace_line(line: &str, theme: &Theme) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with("at ") {
        theme.trace_frame.paint(line)
    } else if trimmed.chars().all(|c| c == '^' || c == ' ' || c == '|') && trimmed.contains('^') {
        theme.trace_caret.paint(line)
    } else {
        line.to_string()
    }
}
