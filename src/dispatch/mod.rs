//! Event dispatch.
//!
//! Parses inbound messages and routes them to the aggregate tracker or the
//! row index. A bad message is logged with its raw payload and dropped; it
//! never stops the processing of later messages.

mod event;

pub use event::{BatchStatusEvent, InboundEvent, OperationProgressEvent};

use crate::aggregate::AggregateTracker;
use crate::error::ProgressError;
use crate::merge::default_percentage;
use crate::render::RenderCommand;
use crate::status::classify;
use crate::table::{RowIndex, Upsert};

/// Counters of dispatched messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Raw messages received.
    pub received: usize,
    /// `batch_status` events applied.
    pub batch_updates: usize,
    /// `operation_progress` events applied to a present row.
    pub operation_updates: usize,
    /// `operation_progress` events for rows not in the table.
    pub missing_rows: usize,
    /// Events of an unrecognized kind.
    pub unknown: usize,
    /// Messages that failed to parse.
    pub malformed: usize,
}

impl std::fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} messages: {} batch, {} operation, {} missing rows, {} unknown, {} malformed",
            self.received,
            self.batch_updates,
            self.operation_updates,
            self.missing_rows,
            self.unknown,
            self.malformed
        )
    }
}

/// Routes inbound events to the state they update.
#[derive(Debug, Default)]
pub struct Dispatcher {
    rows: RowIndex,
    aggregate: AggregateTracker,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher over seeded state.
    pub fn new(rows: RowIndex, aggregate: AggregateTracker) -> Self {
        Self {
            rows,
            aggregate,
            stats: DispatchStats::default(),
        }
    }

    /// Handle one raw message, returning what to render.
    pub fn handle(&mut self, raw: &str) -> Vec<RenderCommand> {
        self.stats.received += 1;

        match InboundEvent::parse(raw) {
            Ok(event) => {
                log::debug!("Received {} message", event.kind());
                self.apply(event)
            }
            Err(ProgressError::MalformedMessage { reason, raw }) => {
                self.stats.malformed += 1;
                log::error!("Error parsing batch message: {} Raw data: {}", reason, raw);
                Vec::new()
            }
            Err(e) => {
                self.stats.malformed += 1;
                log::error!("Error parsing batch message: {} Raw data: {}", e, raw);
                Vec::new()
            }
        }
    }

    /// Apply an already parsed event.
    pub fn apply(&mut self, event: InboundEvent) -> Vec<RenderCommand> {
        match event {
            InboundEvent::BatchStatus(batch) => {
                self.stats.batch_updates += 1;
                self.apply_batch(&batch)
            }
            InboundEvent::OperationProgress(op) => self.apply_operation(&op).into_iter().collect(),
            InboundEvent::Unknown { kind } => {
                self.stats.unknown += 1;
                log::info!(
                    "Unknown message type: {}",
                    kind.as_deref().unwrap_or("undefined")
                );
                Vec::new()
            }
        }
    }

    fn apply_batch(&mut self, batch: &BatchStatusEvent) -> Vec<RenderCommand> {
        log::debug!(
            "Processing batch status update: {} ({}/{})",
            batch.status,
            batch.completed(),
            batch.total()
        );

        let mut commands = self.aggregate.update_rates(batch.rates());
        if let Some(report) = &batch.progress_report {
            commands.push(self.aggregate.set_progress_report(report));
        }
        commands.push(
            self.aggregate
                .update(batch.completed(), batch.total(), &batch.status),
        );
        commands
    }

    fn apply_operation(&mut self, op: &OperationProgressEvent) -> Option<RenderCommand> {
        let status = classify(&op.status);
        let candidate = default_percentage(status, op.progress());
        log::debug!(
            "Updating progress for operation {}: {} ({}%)",
            op.operation_id,
            op.status,
            candidate
        );

        match self.rows.upsert(&op.operation_id, status, candidate) {
            Upsert::Render(command) => {
                self.stats.operation_updates += 1;
                Some(command)
            }
            Upsert::NoOp => {
                self.stats.missing_rows += 1;
                log::debug!("Operation row not found for ID: {}", op.operation_id);
                None
            }
        }
    }

    /// Row index.
    pub fn rows(&self) -> &RowIndex {
        &self.rows
    }

    /// Aggregate tracker.
    pub fn aggregate(&self) -> &AggregateTracker {
        &self.aggregate
    }

    /// Dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Field;
    use crate::status::OperationStatus;

    fn dispatcher_with_rows(rows: &[(&str, &str)]) -> Dispatcher {
        let mut index = RowIndex::new();
        for (id, text) in rows {
            index.seed(id, text);
        }
        Dispatcher::new(index, AggregateTracker::new())
    }

    #[test]
    fn test_batch_status_routing() {
        let mut dispatcher = dispatcher_with_rows(&[]);
        let commands = dispatcher.handle(
            r#"{"type":"batch_status","completed":5,"total":10,"status":"in-progress",
                "success_rate":40,"failed_rate":10,"progress_report":"5 out of 10"}"#,
        );

        assert_eq!(commands.len(), 4);
        assert_eq!(
            commands[0],
            RenderCommand::Rate {
                field: Field::SuccessRate,
                value: 40.0
            }
        );
        assert_eq!(
            commands[2],
            RenderCommand::ProgressReport {
                text: "5 out of 10".into()
            }
        );
        assert_eq!(commands[3].percentage(), Some(50));
        assert_eq!(dispatcher.stats().batch_updates, 1);
    }

    #[test]
    fn test_operation_progress_routing() {
        let mut dispatcher = dispatcher_with_rows(&[("op-42", "-")]);
        let commands = dispatcher.handle(
            r#"{"type":"operation_progress","operation_id":"op-42","status":"in-progress"}"#,
        );

        assert_eq!(
            commands,
            vec![RenderCommand::Operation {
                operation_id: "op-42".into(),
                status: OperationStatus::InProgress,
                percentage: 5,
            }]
        );
    }

    #[test]
    fn test_missing_row_produces_nothing() {
        let mut dispatcher = dispatcher_with_rows(&[("op-1", "-")]);
        let commands = dispatcher.handle(
            r#"{"type":"operation_progress","operation_id":"op-9","status":"success","progress":100}"#,
        );
        assert!(commands.is_empty());
        assert_eq!(dispatcher.stats().missing_rows, 1);
        assert!(!dispatcher.rows().contains("op-9"));
    }

    #[test]
    fn test_malformed_between_valid_messages() {
        let mut dispatcher = dispatcher_with_rows(&[("op-1", "-")]);

        let first = dispatcher.handle(
            r#"{"type":"operation_progress","operation_id":"op-1","status":"in-progress","progress":20}"#,
        );
        let bad = dispatcher.handle(r#"{"type":"operation_progress", oops"#);
        let second = dispatcher.handle(
            r#"{"type":"operation_progress","operation_id":"op-1","status":"in-progress","progress":60}"#,
        );

        assert_eq!(first[0].percentage(), Some(20));
        assert!(bad.is_empty());
        assert_eq!(second[0].percentage(), Some(60));

        let stats = dispatcher.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.operation_updates, 2);
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let mut dispatcher = dispatcher_with_rows(&[]);
        assert!(dispatcher.handle(r#"{"type":"heartbeat"}"#).is_empty());
        assert!(dispatcher.handle(r#"{"no_type":true}"#).is_empty());
        assert_eq!(dispatcher.stats().unknown, 2);
        assert_eq!(dispatcher.stats().malformed, 0);
    }

    #[test]
    fn test_operation_sequence_is_monotonic_until_terminal() {
        let mut dispatcher = dispatcher_with_rows(&[("op-1", "-")]);
        let events = [
            ("in-progress", 30),
            ("in-progress", 10),
            ("in-progress", 75),
            ("success", 0),
            ("in-progress", 40),
            ("failed", 10),
        ];

        let mut displayed = Vec::new();
        for (status, progress) in events {
            let raw = format!(
                r#"{{"type":"operation_progress","operation_id":"op-1","status":"{}","progress":{}}}"#,
                status, progress
            );
            for command in dispatcher.handle(&raw) {
                displayed.push(command.percentage().unwrap());
            }
        }

        assert_eq!(displayed, vec![30, 30, 75, 100, 100, 100]);
        assert_eq!(
            dispatcher.rows().get("op-1").unwrap().status,
            OperationStatus::Success
        );
    }

    #[test]
    fn test_seeded_failed_row_follows_reported_progress() {
        let mut dispatcher = dispatcher_with_rows(&[("op-9", "failed")]);

        let first = dispatcher.handle(
            r#"{"type":"operation_progress","operation_id":"op-9","status":"failed","progress":30}"#,
        );
        let second = dispatcher.handle(
            r#"{"type":"operation_progress","operation_id":"op-9","status":"failed","progress":80}"#,
        );

        assert_eq!(first[0].percentage(), Some(30));
        assert_eq!(second[0].percentage(), Some(80));
    }

    #[test]
    fn test_stats_display() {
        let mut dispatcher = dispatcher_with_rows(&[]);
        dispatcher.handle("{}");
        let text = dispatcher.stats().to_string();
        assert!(text.starts_with("1 messages"));
        assert!(text.contains("1 unknown"));
    }
}
