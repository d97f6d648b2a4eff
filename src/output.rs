//! Rendering a finished report as the human-readable run log.
//!
//! Notes come first, then an `ERRORS` block, then a `WARNINGS` block, then a
//! single overall status line. When any note carries an `[error]` or
//! `[warning]` tag, every note line gains a three-column margin so tagged
//! lines can be flagged with `*E` / `*W` markers the block headers point
//! back to.

use std::io::{self, Write};

use crate::error::Finding;
use crate::report::{ExitStatus, RunReport};

const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";

/// Writes run logs, with ANSI colour on the margins and the status line
/// when the sink is a terminal.
pub struct Output {
    show_colors: bool,
}

impl Output {
    pub fn new() -> Self {
        Self {
            show_colors: atty::is(atty::Stream::Stderr),
        }
    }

    /// Never colours; for captured logs and tests.
    pub fn plain() -> Self {
        Self { show_colors: false }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Writes the whole log for `report` to `sink`.
    pub fn render(&self, report: &RunReport, sink: &mut impl Write) -> io::Result<()> {
        self.render_notes(report, sink)?;

        self.render_findings(report, report.errors(), "ERRORS", sink)?;
        if report.stop_error {
            writeln!(sink)?;
            writeln!(
                sink,
                "NOTE: the last error [{}] prevented a complete analysis of the project",
                report.errors().len(),
            )?;
        }
        self.render_findings(report, report.warnings(), "WARNINGS", sink)?;

        let status = report.status();
        writeln!(
            sink,
            "Overall status {} [{}]: {}",
            self.colorize(status.name(), status_color(status)),
            status.code(),
            status.description(),
        )
    }

    fn render_notes(&self, report: &RunReport, sink: &mut impl Write) -> io::Result<()> {
        writeln!(sink)?;

        let global_indent = if report.has_tagged_notes() { "   " } else { "" };
        for note in report.notes() {
            if note.text.is_empty() {
                writeln!(sink)?;
                continue;
            }
            let prefix = if note.no_prefix { "  " } else { "NOTE: " };
            let lower = note.text.to_lowercase();
            let margin = if lower.contains("[error]") {
                self.colorize("*E ", RED)
            } else if lower.contains("[warning]") {
                self.colorize("*W ", YELLOW)
            } else {
                global_indent.to_string()
            };

            let lines: Vec<&str> = note.text.split('\n').collect();
            let extra = hanging_indent(&lines);
            for (i, line) in lines.iter().enumerate() {
                let active_extra = if i > 0 { extra.as_str() } else { "" };
                writeln!(sink, "{margin}{prefix}{active_extra}{line}")?;
            }
        }
        Ok(())
    }

    fn render_findings(
        &self,
        report: &RunReport,
        findings: &[Finding],
        label: &str,
        sink: &mut impl Write,
    ) -> io::Result<()> {
        if findings.is_empty() {
            return Ok(());
        }

        let hint = if report.has_tagged_notes() {
            format!(
                " - see items with *{}s in the margin above for further context",
                &label[..1],
            )
        } else {
            String::new()
        };
        writeln!(sink)?;
        writeln!(sink, "{label} [{}]:{hint}", findings.len())?;
        writeln!(sink)?;

        for (i, finding) in findings.iter().enumerate() {
            writeln!(sink, "{}. code: {}", i + 1, finding.code)?;
            writeln!(sink, "   caused by: {}", finding.cause)?;
            let mut lines = finding.detail.lines().map(str::trim);
            writeln!(sink, "   detailed message: {}", lines.next().unwrap_or(""))?;
            for line in lines {
                writeln!(sink, "   {line}")?;
            }
            writeln!(sink)?;
        }
        Ok(())
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn status_color(status: ExitStatus) -> &'static str {
    match status {
        ExitStatus::Ok => GREEN,
        ExitStatus::Warn => YELLOW,
        _ => RED,
    }
}

/// Continuation lines of a numbered listing note line up under the text
/// that follows the number.
fn hanging_indent(lines: &[&str]) -> String {
    if lines.len() < 2 {
        return String::new();
    }
    let first = lines[0];
    let unpadded = first.trim_start_matches(' ');
    if !unpadded.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return String::new();
    }
    let rest = unpadded
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches('.')
        .trim_start_matches(' ');
    " ".repeat(first.len() - rest.len())
}
