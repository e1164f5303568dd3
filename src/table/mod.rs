//! Operation row index.
//!
//! Tracks the last reconciled state of every operation row present in the
//! rendered table. Rows are seeded once from the document and afterwards only
//! updated; push events for unknown rows are a no-op.

use std::collections::BTreeMap;

use crate::merge::{default_percentage, merge, EntityKind};
use crate::render::RenderCommand;
use crate::status::{classify, OperationStatus};

/// Last known state of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationProgress {
    /// Row identifier.
    pub operation_id: String,
    /// Reconciled status.
    pub status: OperationStatus,
    /// Displayed percentage.
    pub percentage: u8,
}

/// Outcome of applying an update to the index.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    /// The row exists; render this.
    Render(RenderCommand),
    /// The row is not in the table.
    NoOp,
}

#[derive(Debug, Clone)]
struct RowState {
    status: OperationStatus,
    /// `None` until a bar has been shown for the row.
    displayed: Option<u8>,
    updates: u64,
}

/// Mapping from operation identifier to its row state.
#[derive(Debug, Default)]
pub struct RowIndex {
    rows: BTreeMap<String, RowState>,
}

impl RowIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row from the status text already rendered in its cell.
    ///
    /// Returns the command that replaces the plain text with a bar, or `None`
    /// for pending rows and rows that were already seeded.
    pub fn seed(&mut self, operation_id: &str, status_text: &str) -> Option<RenderCommand> {
        if operation_id.is_empty() {
            log::debug!("Ignoring row without operation id");
            return None;
        }
        if self.rows.contains_key(operation_id) {
            log::debug!("Operation {} already seeded", operation_id);
            return None;
        }

        let status = classify(status_text.trim());
        let displayed = status
            .has_progress_bar()
            .then(|| default_percentage(status, None) as u8);

        self.rows.insert(
            operation_id.to_string(),
            RowState {
                status,
                displayed,
                updates: 0,
            },
        );

        displayed.map(|percentage| RenderCommand::Operation {
            operation_id: operation_id.to_string(),
            status,
            percentage,
        })
    }

    /// Merge an update for a row.
    ///
    /// Once a row is terminal its status is frozen. Updates carrying that same
    /// status still merge their progress; any other status re-renders the
    /// current values.
    pub fn upsert(&mut self, operation_id: &str, status: OperationStatus, candidate: i64) -> Upsert {
        let Some(row) = self.rows.get_mut(operation_id) else {
            return Upsert::NoOp;
        };
        row.updates += 1;

        let frozen = row.status.is_terminal();
        if !frozen && (status != OperationStatus::Pending || row.status == OperationStatus::Pending) {
            row.status = status;
        }

        // A terminal row still takes progress reported under its own status.
        if (!frozen || status == row.status) && row.status.has_progress_bar() {
            row.displayed = Some(merge(
                EntityKind::Operation,
                row.displayed,
                candidate,
                row.status,
            ));
        }

        Upsert::Render(RenderCommand::Operation {
            operation_id: operation_id.to_string(),
            status: row.status,
            percentage: row.displayed.unwrap_or(0),
        })
    }

    /// Current state of a row.
    pub fn get(&self, operation_id: &str) -> Option<OperationProgress> {
        self.rows.get(operation_id).map(|row| OperationProgress {
            operation_id: operation_id.to_string(),
            status: row.status,
            percentage: row.displayed.unwrap_or(0),
        })
    }

    /// Check if a row is present.
    pub fn contains(&self, operation_id: &str) -> bool {
        self.rows.contains_key(operation_id)
    }

    /// Number of updates applied to a row since seeding.
    pub fn update_count(&self, operation_id: &str) -> u64 {
        self.rows.get(operation_id).map(|row| row.updates).unwrap_or(0)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the index has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = OperationProgress> + '_ {
        self.rows.keys().filter_map(|id| self.get(id))
    }
}
