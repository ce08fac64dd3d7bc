//! Markdown rendering of the report model.
//!
//! The output is ordinary Markdown: one H1 per scenario, an overview
//! table, the detailed command log, and the cleanup table with a single
//! `shellsession` transcript. The ANSI renderer in [`crate::highlight`]
//! reuses this renderer with placeholder tokens standing in for heredoc
//! stdin bodies, so colorized output strips back to exactly this text.

use crate::model::{ActionReport, Detail, Report, Status, Text};
use crate::trace::{render_trace, TraceOptions};

/// Notice shown instead of the cleanup table when cleanup was skipped.
const CLEANUP_SKIPPED_NOTICE: &str =
    "Cleanup was skipped: resources created by this scenario were preserved for inspection.";

/// Render the report as plain Markdown. Scenarios with no actions and no
/// BDD sections render nothing; an empty report is the empty string.
pub fn render_markdown(report: &Report) -> String {
    render_internal(report, false).text
}

/// A heredoc stdin body replaced by a placeholder token.
pub(crate) struct StdinBlock {
    pub token: String,
    pub text: Text,
}

pub(crate) struct RenderedReport {
    pub text: String,
    pub stdin_blocks: Vec<StdinBlock>,
}

pub(crate) fn render_internal(report: &Report, placeholders: bool) -> RenderedReport {
    let trace_options = TraceOptions::discover();
    let mut out = String::new();
    let mut stdin_blocks = Vec::new();

    for scenario in &report.scenarios {
        if scenario.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("# {}\n", scenario.name));

        if !scenario.overview.is_empty() {
            out.push_str("\n## Scenario Overview\n\n");
            out.push_str("| # | Action | Status |\n");
            out.push_str("| --- | --- | --- |\n");
            for (index, item) in scenario.overview.iter().enumerate() {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    index + 1,
                    item.name,
                    item.status.emoji()
                ));
            }
        }

        if !scenario.details.is_empty() {
            out.push_str("\n## Scenario Details\n");
            for detail in &scenario.details {
                match detail {
                    Detail::Section(section) => {
                        out.push_str(&format!(
                            "\n### {}: {}\n",
                            section.keyword, section.description
                        ));
                        for action in &section.actions {
                            render_action(
                                &mut out,
                                action,
                                placeholders,
                                &mut stdin_blocks,
                                &trace_options,
                            );
                        }
                    }
                    Detail::Action(action) => {
                        render_action(
                            &mut out,
                            action,
                            placeholders,
                            &mut stdin_blocks,
                            &trace_options,
                        );
                    }
                }
            }
        }

        if scenario.cleanup_skipped {
            out.push_str("\n## Cleanup (skipped)\n\n");
            out.push_str(CLEANUP_SKIPPED_NOTICE);
            out.push('\n');
        } else if !scenario.cleanup.is_empty() {
            out.push_str("\n## Cleanup\n\n");
            out.push_str("| # | Action | Status |\n");
            out.push_str("| --- | --- | --- |\n");
            for (index, item) in scenario.cleanup.iter().enumerate() {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    index + 1,
                    item.action,
                    item.status.emoji()
                ));
            }

            out.push_str("\n```shellsession\n");
            for (index, item) in scenario.cleanup.iter().enumerate() {
                if index > 0 {
                    out.push('\n');
                }
                out.push_str(&format!(
                    "$ {}\n",
                    command_line(&item.command.cmd, &item.command.args)
                ));
                let output = item.command.output.trim_end();
                if !output.is_empty() {
                    out.push_str(output);
                    out.push('\n');
                }
            }
            out.push_str("```\n");
        }
    }

    RenderedReport {
        text: out,
        stdin_blocks,
    }
}

fn render_action(
    out: &mut String,
    action: &ActionReport,
    placeholders: bool,
    stdin_blocks: &mut Vec<StdinBlock>,
    trace_options: &TraceOptions,
) {
    let failed = action.error.is_some();
    let emoji = if failed {
        Status::Failure.emoji()
    } else {
        Status::Success.emoji()
    };
    out.push_str(&format!("\n**{emoji} {}**", action.name));
    if failed {
        if let Some(attempts) = action.attempts {
            out.push_str(&format!(" (Failed after {attempts} attempts)"));
        }
    }
    out.push('\n');

    for command in &action.commands {
        let line = command_line(&command.cmd, &command.args);
        out.push_str("\n```shell\n");
        match &command.stdin {
            Some(stdin) => {
                let body = stdin.value.trim_end_matches('\n').to_string();
                out.push_str(&format!("{line} <<EOF\n"));
                if placeholders {
                    let token = format!("\u{e000}kest-stdin-{}\u{e000}", stdin_blocks.len());
                    out.push_str(&token);
                    stdin_blocks.push(StdinBlock {
                        token,
                        text: Text {
                            value: body,
                            language: stdin.language.clone(),
                        },
                    });
                } else {
                    out.push_str(&body);
                }
                out.push_str("\nEOF\n");
            }
            None => {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out.push_str("```\n");

        render_output(out, "stdout", command.stdout.as_ref());
        render_output(out, "stderr", command.stderr.as_ref());
    }

    if let Some(error) = &action.error {
        let language = error.message.language.as_deref().unwrap_or("text");
        out.push_str("\nError:\n\n");
        out.push_str(&format!("```{language}\n"));
        out.push_str(error.message.value.trim_end());
        out.push_str("\n```\n");

        if let Some(stack) = &error.stack {
            let rendered = render_trace(stack, trace_options);
            if !rendered.trim().is_empty() {
                out.push_str("\n```trace\n");
                out.push_str(rendered.trim_end());
                out.push_str("\n```\n");
            }
        }
    }
}

fn render_output(out: &mut String, label: &str, text: Option<&Text>) {
    let Some(text) = text else {
        return;
    };
    let value = text.value.trim();
    if value.is_empty() {
        return;
    }
    out.push_str(&format!("\n{label}:\n\n"));
    out.push_str(&format!(
        "```{}\n",
        text.language.as_deref().unwrap_or("")
    ));
    out.push_str(value);
    out.push_str("\n```\n");
}

fn command_line(cmd: &str, args: &[String]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{cmd} {}", args.join(" "))
    }
}
