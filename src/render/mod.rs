//! Entity rendering.
//!
//! Pure translation of reconciled state into display fragments. Nothing here
//! touches a document; [`crate::surface::Surface`] applies the fragments.

mod html;

pub use html::{escape_html, main_status_html, operation_bar_html};

use serde::{Deserialize, Serialize};

use crate::status::OperationStatus;

/// Class marking a status cell that holds a progress bar.
pub const STATUS_CELL_CLASS: &str = "status-cell";

/// Transient class marking a recently updated row.
pub const HIGHLIGHT_CLASS: &str = "operation-updated";

/// Batch-level read-only fields outside the main status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Percentage of successful operations.
    SuccessRate,
    /// Percentage of failed operations.
    FailedRate,
    /// Percentage of aborted operations.
    AbortedRate,
    /// Textual completion report, e.g. "5 out of 10".
    Completed,
}

impl Field {
    /// Field name as used by the hosting document.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SuccessRate => "success_rate",
            Self::FailedRate => "failed_rate",
            Self::AbortedRate => "aborted_rate",
            Self::Completed => "completed",
        }
    }
}

/// Element of the hosting document a fragment applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Target {
    /// Table row of an operation.
    Row(String),
    /// Status cell within an operation's row.
    StatusCell(String),
    /// Main batch status field.
    MainStatus,
    /// One of the batch read-only fields.
    Field(Field),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Row(id) => write!(f, "row[{}]", id),
            Self::StatusCell(id) => write!(f, "status-cell[{}]", id),
            Self::MainStatus => write!(f, "main-status"),
            Self::Field(field) => write!(f, "field[{}]", field.name()),
        }
    }
}

/// Mutation to perform on a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOp {
    /// Replace the inner markup.
    SetHtml(String),
    /// Replace the text content.
    SetText(String),
    /// Add a class.
    AddClass(String),
    /// Remove a class.
    RemoveClass(String),
}

/// A single display mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Where to apply it.
    pub target: Target,
    /// What to do.
    pub op: FragmentOp,
}

impl Fragment {
    /// Build a fragment.
    pub fn new(target: Target, op: FragmentOp) -> Self {
        Self { target, op }
    }
}

/// Reconciled state ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Progress bar of one operation row.
    Operation {
        /// Row identifier.
        operation_id: String,
        /// Reconciled status.
        status: OperationStatus,
        /// Reconciled percentage.
        percentage: u8,
    },
    /// Main batch status with its aggregate bar.
    Batch {
        /// Status label as received or as rendered.
        label: String,
        /// Classified status.
        status: OperationStatus,
        /// Displayed aggregate percentage.
        percentage: u8,
        /// Completed and total counts, when known.
        counts: Option<(u64, u64)>,
    },
    /// A server-reported rate.
    Rate {
        /// Which rate field.
        field: Field,
        /// Reported value, displayed as-is.
        value: f64,
    },
    /// Free-text completion report.
    ProgressReport {
        /// Displayed verbatim.
        text: String,
    },
}

impl RenderCommand {
    /// Percentage carried by the command, if it drives a progress bar.
    pub fn percentage(&self) -> Option<u8> {
        match self {
            Self::Operation { percentage, .. } | Self::Batch { percentage, .. } => {
                Some(*percentage)
            }
            _ => None,
        }
    }
}

/// Render a command into display fragments.
pub fn render(command: &RenderCommand) -> Vec<Fragment> {
    match command {
        RenderCommand::Operation {
            operation_id,
            status,
            percentage,
        } => render_operation(operation_id, *status, *percentage),
        RenderCommand::Batch {
            label,
            status,
            percentage,
            counts,
        } => vec![Fragment::new(
            Target::MainStatus,
            FragmentOp::SetHtml(main_status_html(label, *status, *percentage, *counts)),
        )],
        RenderCommand::Rate { field, value } => vec![Fragment::new(
            Target::Field(*field),
            FragmentOp::SetText(format!("{}%", value)),
        )],
        RenderCommand::ProgressReport { text } => vec![Fragment::new(
            Target::Field(Field::Completed),
            FragmentOp::SetText(text.clone()),
        )],
    }
}

/// Fragments for one operation row. Pending rows get no bar at all.
pub fn render_operation(operation_id: &str, status: OperationStatus, percentage: u8) -> Vec<Fragment> {
    if !status.has_progress_bar() {
        return Vec::new();
    }

    let cell = Target::StatusCell(operation_id.to_string());
    vec![
        Fragment::new(cell.clone(), FragmentOp::AddClass(STATUS_CELL_CLASS.into())),
        Fragment::new(cell, FragmentOp::SetHtml(operation_bar_html(status, percentage))),
    ]
}

/// Fragments that turn a row's highlight on and off.
pub fn highlight(operation_id: &str) -> (Fragment, Fragment) {
    let row = Target::Row(operation_id.to_string());
    (
        Fragment::new(row.clone(), FragmentOp::AddClass(HIGHLIGHT_CLASS.into())),
        Fragment::new(row, FragmentOp::RemoveClass(HIGHLIGHT_CLASS.into())),
    )
}
