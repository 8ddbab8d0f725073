// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for unmark.

use thiserror::Error;

use crate::types::JobState;

/// Top-level error type for all unmark operations.
///
/// Every variant is fatal for the job that raised it. Per-match redaction
/// trouble is not an error: it is recorded as a
/// [`RedactionWarning`](crate::types::RedactionWarning) in the job report.
#[derive(Debug, Error)]
pub enum UnmarkError {
    // -- Input errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported PDF structure: {0}")]
    UnsupportedStructure(String),

    // -- Job errors --
    #[error("job exceeded its {seconds}s processing budget")]
    Timeout { seconds: u64 },

    #[error("illegal job transition {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("internal error: {0}")]
    Internal(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UnmarkError {
    /// Whether the error was caused by the caller's input rather than by the
    /// engine or the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedStructure(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, UnmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_classified() {
        assert!(UnmarkError::InvalidInput("not a pdf".into()).is_input_error());
        assert!(UnmarkError::UnsupportedStructure("encrypted".into()).is_input_error());
        assert!(!UnmarkError::Timeout { seconds: 5 }.is_input_error());
    }

    #[test]
    fn timeout_message_names_budget() {
        let err = UnmarkError::Timeout { seconds: 30 };
        assert_eq!(err.to_string(), "job exceeded its 30s processing budget");
    }
}
