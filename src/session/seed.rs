//! Seeding state from the initially rendered document.

use crate::aggregate::AggregateTracker;
use crate::render::{Field, RenderCommand, Target};
use crate::surface::Surface;
use crate::table::RowIndex;

/// State recovered from the rendered document.
#[derive(Debug, Default)]
pub struct Seeded {
    /// One entry per rendered row.
    pub rows: RowIndex,
    /// Batch status as rendered.
    pub aggregate: AggregateTracker,
    /// Commands that replace plain status text with progress bars.
    pub commands: Vec<RenderCommand>,
}

/// Read rows and the main status from the document.
pub fn seed_from_surface<S: Surface + ?Sized>(surface: &S) -> Seeded {
    let mut seeded = Seeded::default();

    let ids = surface.operation_ids();
    if ids.is_empty() {
        log::info!("No existing operations found in table");
    } else {
        log::info!("Found {} existing operation rows to initialize", ids.len());
    }

    for id in ids {
        let status_text = surface
            .text(&Target::StatusCell(id.clone()))
            .unwrap_or_default();
        log::debug!("Initializing operation {} with status: {}", id, status_text);
        if let Some(command) = seeded.rows.seed(&id, &status_text) {
            seeded.commands.push(command);
        }
    }

    if let Some(status_text) = surface.text(&Target::MainStatus) {
        let completed_text = surface.text(&Target::Field(Field::Completed));
        if let Some(command) = seeded.aggregate.seed(&status_text, completed_text.as_deref()) {
            seeded.commands.push(command);
        }
    } else {
        log::debug!("No main status field in document");
    }

    seeded
}
