//! Status classification.
//!
//! Maps free-text status labels, as shown in the table or pushed by the
//! server, onto [`OperationStatus`]. Matching is case-sensitive and works on
//! substrings, so "completed successfully" is a success while "SUCCESS" is
//! not recognized at all.

use serde::{Deserialize, Serialize};

/// Semantic status of an operation or a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    /// Not started, unknown, or the "-" placeholder.
    #[default]
    Pending,
    /// Currently upgrading.
    InProgress,
    /// Finished successfully.
    Success,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Aborted,
}

/// Every status, in lifecycle order.
pub const ALL_STATUSES: [OperationStatus; 5] = [
    OperationStatus::Pending,
    OperationStatus::InProgress,
    OperationStatus::Success,
    OperationStatus::Failed,
    OperationStatus::Aborted,
];

/// Status to CSS token table.
const TOKENS: [(OperationStatus, &str); 5] = [
    (OperationStatus::Pending, "pending"),
    (OperationStatus::InProgress, "in-progress"),
    (OperationStatus::Success, "success"),
    (OperationStatus::Failed, "failed"),
    (OperationStatus::Aborted, "aborted"),
];

impl OperationStatus {
    /// CSS-safe token used for status classes.
    pub fn token(&self) -> &'static str {
        TOKENS
            .iter()
            .find(|(status, _)| status == self)
            .map(|(_, token)| *token)
            .unwrap_or("pending")
    }

    /// Check if no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Aborted)
    }

    /// Pending entities get no progress bar.
    pub fn has_progress_bar(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Classify a free-text status label.
///
/// Anything unrecognized, including the empty string and "-", is pending.
pub fn classify(label: &str) -> OperationStatus {
    if label.contains("success") {
        OperationStatus::Success
    } else if label.contains("failed") {
        OperationStatus::Failed
    } else if label.contains("aborted") {
        OperationStatus::Aborted
    } else if label.contains("in progress") || label.contains("in-progress") {
        OperationStatus::InProgress
    } else {
        OperationStatus::Pending
    }
}
