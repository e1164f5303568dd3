//! Aggregate batch status tracking.

use std::sync::OnceLock;

use regex::Regex;

use crate::merge::{clamp_percent, merge, ratio_percent, EntityKind};
use crate::render::{Field, RenderCommand};
use crate::status::{classify, OperationStatus};

/// Server-reported rates. Point-in-time facts, never merged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    /// Percentage of successful operations.
    pub success: Option<f64>,
    /// Percentage of failed operations.
    pub failed: Option<f64>,
    /// Percentage of aborted operations.
    pub aborted: Option<f64>,
}

impl Rates {
    fn commands(&self) -> impl Iterator<Item = RenderCommand> {
        [
            (Field::SuccessRate, self.success),
            (Field::FailedRate, self.failed),
            (Field::AbortedRate, self.aborted),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|value| RenderCommand::Rate { field, value }))
    }
}

/// Batch-level progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProgress {
    /// Completed operations.
    pub completed: u64,
    /// Total operations, at least one.
    pub total: u64,
    /// Classified batch status.
    pub status: OperationStatus,
    /// Status label as last displayed.
    pub label: String,
    /// Latest reported rates.
    pub rates: Rates,
    /// Latest textual completion report.
    pub progress_report: Option<String>,
    /// Displayed aggregate percentage, `None` before the first render.
    pub displayed: Option<u8>,
}

impl BatchProgress {
    /// Displayed percentage, zero before the first render.
    pub fn percentage(&self) -> u8 {
        self.displayed.unwrap_or(0)
    }
}

/// Tracks the aggregate batch status and derives its percentage.
#[derive(Debug)]
pub struct AggregateTracker {
    state: BatchProgress,
}

impl Default for AggregateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateTracker {
    /// Create a tracker with nothing displayed yet.
    pub fn new() -> Self {
        Self {
            state: BatchProgress {
                total: 1,
                ..Default::default()
            },
        }
    }

    /// Current batch progress.
    pub fn progress(&self) -> &BatchProgress {
        &self.state
    }

    /// Seed from the status and completion texts already rendered.
    ///
    /// Finished batches start at 100; in-progress batches start at the ratio
    /// parsed from "N out of M" text. Returns `None` for empty or "-" status.
    pub fn seed(&mut self, status_text: &str, completed_text: Option<&str>) -> Option<RenderCommand> {
        let label = status_text.trim();
        if label.is_empty() || label == "-" {
            return None;
        }

        let status = seed_status(label);
        let counts = completed_text.and_then(parse_completed_report);
        let initial = match status {
            OperationStatus::Success | OperationStatus::Failed => 100,
            OperationStatus::InProgress => counts
                .filter(|(_, total)| *total > 0)
                .map(|(completed, total)| clamp_percent(ratio_percent(completed, total)))
                .unwrap_or(0),
            _ => 0,
        };

        if let Some((completed, total)) = counts {
            self.state.completed = completed;
            self.state.total = total.max(1);
        }
        self.state.status = status;
        self.state.label = label.to_string();
        self.state.displayed = Some(initial);

        log::info!("Seeded batch status '{}' at {}%", label, initial);

        Some(RenderCommand::Batch {
            label: label.to_string(),
            status,
            percentage: initial,
            counts,
        })
    }

    /// Apply a batch status update.
    ///
    /// The caller guarantees `total >= 1`; zero is still treated as one.
    pub fn update(&mut self, completed: u64, total: u64, label: &str) -> RenderCommand {
        let total = total.max(1);
        let status = classify(label);
        let candidate = ratio_percent(completed, total);

        let mut percentage = merge(EntityKind::Batch, self.state.displayed, candidate, status);
        if matches!(status, OperationStatus::Success | OperationStatus::Failed) {
            percentage = 100;
        }

        self.state.completed = completed;
        self.state.total = total;
        self.state.status = status;
        self.state.label = label.to_string();
        self.state.displayed = Some(percentage);

        RenderCommand::Batch {
            label: label.to_string(),
            status,
            percentage,
            counts: Some((completed, total)),
        }
    }

    /// Record reported rates; only the ones present are rendered.
    pub fn update_rates(&mut self, rates: Rates) -> Vec<RenderCommand> {
        let current = &mut self.state.rates;
        if rates.success.is_some() {
            current.success = rates.success;
        }
        if rates.failed.is_some() {
            current.failed = rates.failed;
        }
        if rates.aborted.is_some() {
            current.aborted = rates.aborted;
        }
        rates.commands().collect()
    }

    /// Record a free-text completion report, displayed verbatim.
    pub fn set_progress_report(&mut self, text: &str) -> RenderCommand {
        self.state.progress_report = Some(text.to_string());
        RenderCommand::ProgressReport {
            text: text.to_string(),
        }
    }
}

/// Classify a rendered batch status, including the finished-with-failures label.
fn seed_status(label: &str) -> OperationStatus {
    if label.contains("completed with some failures") {
        OperationStatus::Failed
    } else {
        classify(label)
    }
}

/// Extract `(completed, total)` from text like "5 out of 10".
pub fn parse_completed_report(text: &str) -> Option<(u64, u64)> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(\d+)\s+out\s+of\s+(\d+)").ok())
        .as_ref()?;
    let captures = pattern.captures(text)?;
    let completed = captures.get(1)?.as_str().parse().ok()?;
    let total = captures.get(2)?.as_str().parse().ok()?;
    Some((completed, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentage(command: &RenderCommand) -> u8 {
        command.percentage().unwrap()
    }

    #[test]
    fn test_parse_completed_report() {
        assert_eq!(parse_completed_report("5 out of 10"), Some((5, 10)));
        assert_eq!(parse_completed_report(" 17  out  of 20 devices"), Some((17, 20)));
        assert_eq!(parse_completed_report("five out of ten"), None);
        assert_eq!(parse_completed_report(""), None);
    }

    #[test]
    fn test_update_ratio() {
        let mut tracker = AggregateTracker::new();
        assert_eq!(percentage(&tracker.update(5, 10, "in-progress")), 50);

        let mut tracker = AggregateTracker::new();
        assert_eq!(percentage(&tracker.update(5, 10, "success")), 100);
    }

    #[test]
    fn test_update_in_progress_may_move_down() {
        let mut tracker = AggregateTracker::new();
        tracker.update(8, 10, "in-progress");
        let command = tracker.update(6, 10, "in-progress");
        assert_eq!(percentage(&command), 60);
        assert_eq!(tracker.progress().percentage(), 60);
    }

    #[test]
    fn test_update_other_status_does_not_regress() {
        let mut tracker = AggregateTracker::new();
        tracker.update(8, 10, "in-progress");
        let command = tracker.update(3, 10, "aborted");
        assert_eq!(percentage(&command), 80);
    }

    #[test]
    fn test_update_failed_forces_full() {
        let mut tracker = AggregateTracker::new();
        tracker.update(2, 10, "in-progress");
        assert_eq!(percentage(&tracker.update(4, 10, "failed")), 100);
    }

    #[test]
    fn test_update_zero_total_guard() {
        let mut tracker = AggregateTracker::new();
        let command = tracker.update(0, 0, "in-progress");
        assert_eq!(percentage(&command), 0);
        assert_eq!(tracker.progress().total, 1);
    }

    #[test]
    fn test_update_counts_in_command() {
        let mut tracker = AggregateTracker::new();
        match tracker.update(7, 10, "in-progress") {
            RenderCommand::Batch { counts, label, status, .. } => {
                assert_eq!(counts, Some((7, 10)));
                assert_eq!(label, "in-progress");
                assert_eq!(status, OperationStatus::InProgress);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_seed_in_progress_from_report() {
        let mut tracker = AggregateTracker::new();
        let command = tracker.seed("in progress", Some("5 out of 10")).unwrap();
        assert_eq!(percentage(&command), 50);
        assert_eq!(tracker.progress().completed, 5);
        assert_eq!(tracker.progress().total, 10);
    }

    #[test]
    fn test_seed_finished_statuses() {
        let mut tracker = AggregateTracker::new();
        let command = tracker.seed("completed successfully", Some("3 out of 10")).unwrap();
        assert_eq!(percentage(&command), 100);

        let mut tracker = AggregateTracker::new();
        let command = tracker.seed("completed with some failures", None).unwrap();
        assert_eq!(percentage(&command), 100);
        assert_eq!(tracker.progress().status, OperationStatus::Failed);
    }

    #[test]
    fn test_seed_placeholder_and_unparsable() {
        let mut tracker = AggregateTracker::new();
        assert!(tracker.seed("-", Some("1 out of 2")).is_none());
        assert!(tracker.seed("  ", None).is_none());
        assert_eq!(tracker.progress().displayed, None);

        let command = tracker.seed("in progress", Some("no numbers")).unwrap();
        assert_eq!(percentage(&command), 0);

        let mut tracker = AggregateTracker::new();
        let command = tracker.seed("in progress", Some("4 out of 0")).unwrap();
        assert_eq!(percentage(&command), 0);
    }

    #[test]
    fn test_rates_pass_through() {
        let mut tracker = AggregateTracker::new();
        let commands = tracker.update_rates(Rates {
            success: Some(40.0),
            failed: None,
            aborted: Some(10.0),
        });
        assert_eq!(commands.len(), 2);

        // A lower rate later is displayed as-is.
        let commands = tracker.update_rates(Rates {
            success: Some(20.0),
            ..Default::default()
        });
        assert_eq!(
            commands,
            vec![RenderCommand::Rate {
                field: Field::SuccessRate,
                value: 20.0
            }]
        );
        assert_eq!(tracker.progress().rates.success, Some(20.0));
        assert_eq!(tracker.progress().rates.aborted, Some(10.0));
    }

    #[test]
    fn test_progress_report_verbatim() {
        let mut tracker = AggregateTracker::new();
        let command = tracker.set_progress_report("  7 out of 10 ");
        assert_eq!(
            command,
            RenderCommand::ProgressReport {
                text: "  7 out of 10 ".into()
            }
        );
    }
}
