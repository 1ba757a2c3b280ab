// Copyright 2026 threadgrab contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal failures of an extraction job.

use threadgrab::NormalizationError;

/// Every way an extraction job can end without a post.
///
/// `Mismatch` and `NotYetAvailable` probe outcomes are normal polling states
/// and never surface here.
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    /// The input is not a post URL we can extract from.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The page-load collaborator reported an error. Not retried.
    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// The target data never appeared within the attempt budget.
    #[error("No post data for '{target}' after {attempts} attempt(s) ({mismatches} showed another post)")]
    PollExhausted {
        target: String,
        attempts: u32,
        mismatches: u32,
    },

    /// Data was found but did not decode into a known post shape.
    #[error(transparent)]
    MalformedInput(#[from] NormalizationError),

    /// The overall deadline elapsed before the job finished.
    #[error("Extraction timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The job was superseded or cancelled before it produced a result.
    #[error("Extraction cancelled")]
    Cancelled,
}

impl ExtractionError {
    /// Short machine-readable name, used in events and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTarget(_) => "invalid_target",
            Self::NavigationFailed { .. } => "navigation_failed",
            Self::PollExhausted { .. } => "poll_exhausted",
            Self::MalformedInput(_) => "malformed_input",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Convenience result type.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_diagnostics() {
        let e = ExtractionError::PollExhausted {
            target: "alice".to_string(),
            attempts: 22,
            mismatches: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("22"));
        assert_eq!(e.kind(), "poll_exhausted");
    }

    #[test]
    fn test_malformed_input_from_normalizer() {
        let e: ExtractionError = NormalizationError::MalformedInput("bad".to_string()).into();
        assert_eq!(e.kind(), "malformed_input");
        assert!(e.to_string().contains("bad"));
    }
}
