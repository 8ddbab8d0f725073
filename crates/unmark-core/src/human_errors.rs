// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable outcome messages for whatever shell drives the engine.
//
// Fatal errors map to a short failure message with a suggestion; finished
// jobs map to a success line carrying the watermark count.

use crate::error::UnmarkError;
use crate::types::JobReport;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Trying again (perhaps with a larger budget) may succeed.
    Transient,
    /// The user has to supply a different file.
    ActionRequired,
    /// A bug or environment problem on our side.
    Internal,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-sentence summary, printed first.
    pub message: String,
    /// What to try next, printed under the message.
    pub suggestion: String,
    /// Whether running the same job again may succeed.
    pub retriable: bool,
    /// How the user should react; see [`Severity`].
    pub severity: Severity,
}

/// Convert an `UnmarkError` into a message the shell can show as-is.
pub fn humanize_error(err: &UnmarkError) -> HumanError {
    match err {
        UnmarkError::InvalidInput(detail) => HumanError {
            message: "This file doesn't look like a readable PDF.".into(),
            suggestion: format!("Check that the file opens in a PDF viewer and upload it again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        UnmarkError::UnsupportedStructure(detail) => {
            if detail.to_ascii_lowercase().contains("encrypt") {
                HumanError {
                    message: "This PDF is password-protected.".into(),
                    suggestion: "Remove the password in your PDF viewer, save a copy, and upload that copy.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "This PDF is built in a way we can't safely edit.".into(),
                    suggestion: format!("Try re-saving it with \"Print to PDF\" and upload the new file. ({detail})"),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            }
        }

        UnmarkError::Timeout { seconds } => HumanError {
            message: "Processing took too long and was stopped.".into(),
            suggestion: format!("Try a smaller file or split it into parts. (Limit: {seconds}s)"),
            retriable: true,
            severity: Severity::Transient,
        },

        UnmarkError::Io(io_err) => HumanError {
            message: "We couldn't read or write a file.".into(),
            suggestion: format!("Check the path and permissions, then try again. ({io_err})"),
            retriable: true,
            severity: Severity::Transient,
        },

        UnmarkError::InvalidTransition { .. }
        | UnmarkError::Pdf(_)
        | UnmarkError::Internal(_)
        | UnmarkError::Serialization(_) => HumanError {
            message: "Something went wrong while processing your file.".into(),
            suggestion: format!("Please try again. If it keeps happening, report this message: {err}"),
            retriable: true,
            severity: Severity::Internal,
        },
    }
}

/// One-line success message for a finished job.
pub fn success_message(report: &JobReport) -> String {
    let partial = report.partial_pages();
    let mut line = format!(
        "Done: {} page(s) from {} file(s), {} watermark(s) removed",
        report.pages,
        report.files,
        report.watermarks()
    );
    if !partial.is_empty() {
        let pages: Vec<String> = partial.iter().map(u32::to_string).collect();
        line.push_str(&format!(
            "; page(s) {} were covered rather than cleanly removed",
            pages.join(", ")
        ));
    }
    line
}
