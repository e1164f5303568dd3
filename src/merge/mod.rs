//! Progress merging.
//!
//! Decides which percentage to display when a freshly computed value meets
//! the value already on screen. Operations never regress. Batches follow the
//! authoritative completed/total ratio while in progress and pin to 100 once
//! they finish.

use crate::status::OperationStatus;

/// Smallest bar shown for an in-progress operation.
pub const MIN_IN_PROGRESS_PERCENT: i64 = 5;

/// Kind of entity a percentage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A single operation row.
    Operation,
    /// The aggregate batch.
    Batch,
}

/// Clamp any integer into the displayable `[0, 100]` range.
pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// Merge a candidate percentage with the one currently displayed.
pub fn merge(
    kind: EntityKind,
    previous: Option<u8>,
    candidate: i64,
    status: OperationStatus,
) -> u8 {
    let candidate = clamp_percent(candidate);
    let Some(previous) = previous else {
        return candidate;
    };

    match kind {
        // Failed and aborted follow the same rule: a failure never hides
        // progress that was already shown.
        EntityKind::Operation => previous.max(candidate),
        EntityKind::Batch => match status {
            OperationStatus::InProgress => candidate,
            OperationStatus::Success | OperationStatus::Failed => 100,
            _ => previous.max(candidate),
        },
    }
}

/// Percentage implied by an operation status and its optional reported progress.
pub fn default_percentage(status: OperationStatus, provided: Option<i64>) -> i64 {
    let provided = provided.unwrap_or(0);
    match status {
        OperationStatus::Success => 100,
        OperationStatus::Failed | OperationStatus::Aborted => provided.max(0),
        OperationStatus::InProgress => provided.max(MIN_IN_PROGRESS_PERCENT),
        OperationStatus::Pending => 0,
    }
}

/// Completed/total ratio as a rounded percentage. `total` of zero counts as one.
pub fn ratio_percent(completed: u64, total: u64) -> i64 {
    let total = total.max(1);
    (completed as f64 / total as f64 * 100.0).round() as i64
}
