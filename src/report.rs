use std::time::{Duration, Instant};

use crate::error::{ErrorCode, Fault, Finding};

/// Exit status of a checker run, in order of the exit codes the binary uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The project is good.
    Ok = 0,
    /// The project is bad enough that analysis halted early.
    ErrorIncomplete = 1,
    /// The project is bad.
    Error = 2,
    /// The checker itself failed; analysis did not complete.
    InternalError = 3,
    /// The project is usable but has worrying features (orphaned files etc).
    Warn = 4,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ExitStatus::Ok => "OK",
            ExitStatus::ErrorIncomplete => "ERROR_INCOMPLETE",
            ExitStatus::Error => "ERROR",
            ExitStatus::InternalError => "INTERNAL_ERROR",
            ExitStatus::Warn => "WARN",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitStatus::Ok => "The project was ok",
            ExitStatus::Error => {
                "There was an error in the project that would prevent it loading"
            }
            ExitStatus::ErrorIncomplete => {
                "There was an error [the last one listed] in the project that prevented complete processing"
            }
            ExitStatus::InternalError => {
                "There was an internal error in the project checker, please see the traceback and report this to ccpn!"
            }
            ExitStatus::Warn => "The project was ok and is usable but there were some warnings",
        }
    }
}

/// One line of run commentary. `no_prefix` lines render indented instead of
/// carrying the `NOTE: ` prefix, which is how numbered listings are emitted.
#[derive(Debug, Clone)]
pub struct Note {
    pub text: String,
    pub no_prefix: bool,
}

/// Everything a run observed, in the order it was observed.
///
/// Notes, errors and warnings are append-only so two runs over the same
/// project produce identical sequences. Warnings are promoted to errors at
/// append time when the run was configured that way; promotion changes the
/// severity and nothing else.
#[derive(Debug)]
pub struct RunReport {
    notes: Vec<Note>,
    errors: Vec<Finding>,
    warnings: Vec<Finding>,
    pub stop_error: bool,
    pub internal_error: bool,
    pub model_version: Option<String>,
    warnings_are_errors: bool,
    started: Instant,
    pub elapsed: Option<Duration>,
}

impl RunReport {
    pub fn new(warnings_are_errors: bool) -> Self {
        Self {
            notes: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            stop_error: false,
            internal_error: false,
            model_version: None,
            warnings_are_errors,
            started: Instant::now(),
            elapsed: None,
        }
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.push_note(text, false);
    }

    /// A listing line: rendered without the `NOTE: ` prefix.
    pub fn note_plain(&mut self, text: impl Into<String>) {
        self.push_note(text, true);
    }

    pub fn blank_note(&mut self) {
        self.push_note("", false);
    }

    fn push_note(&mut self, text: impl Into<String>, no_prefix: bool) {
        let text = text.into().trim_end().to_string();
        self.notes.push(Note { text, no_prefix });
    }

    pub fn error(
        &mut self,
        code: ErrorCode,
        cause: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.errors.push(Finding::error(code, cause, detail));
    }

    pub fn warning(
        &mut self,
        code: ErrorCode,
        cause: impl Into<String>,
        detail: impl Into<String>,
    ) {
        if self.warnings_are_errors {
            self.error(code, cause, detail);
        } else {
            self.warnings.push(Finding::warning(code, cause, detail));
        }
    }

    pub fn record_fault(&mut self, fault: Fault) {
        self.errors.push(fault.into());
    }

    /// Records a fault that aborted the run and marks the run as cut short.
    pub fn record_stop(&mut self, fault: Fault) {
        self.record_fault(fault);
        self.stop_error = true;
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn errors(&self) -> &[Finding] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Finding] {
        &self.warnings
    }

    /// True when any note carries an `[error]` or `[warning]` tag.
    pub fn has_tagged_notes(&self) -> bool {
        self.notes.iter().any(|note| {
            let lower = note.text.to_lowercase();
            lower.contains("[error]") || lower.contains("[warning]")
        })
    }

    /// Stamps the elapsed time and appends the runtime note.
    pub fn finish(&mut self) {
        let elapsed = self.started.elapsed();
        self.elapsed = Some(elapsed);
        self.blank_note();
        self.note(format!(
            "analysis took {:.3} seconds",
            elapsed.as_secs_f64()
        ));
    }

    pub fn status(&self) -> ExitStatus {
        if self.internal_error {
            ExitStatus::InternalError
        } else if self.errors.is_empty() && self.warnings.is_empty() {
            ExitStatus::Ok
        } else if !self.errors.is_empty() {
            if self.stop_error {
                ExitStatus::ErrorIncomplete
            } else {
                ExitStatus::Error
            }
        } else {
            ExitStatus::Warn
        }
    }
}
