//! Terminal display of a batch view.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::render::{RenderCommand, Target};
use crate::surface::{MemorySurface, Surface};

const BATCH_TEMPLATE: &str = "{prefix:>12.bold} [{wide_bar:.cyan/blue}] {pos:>3}% {msg}";
const ROW_TEMPLATE: &str = "{prefix:>12} [{bar:40.green/white}] {pos:>3}% {msg}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Document surface that mirrors progress onto terminal bars.
///
/// The document itself is kept in a [`MemorySurface`]; bars are created on
/// the first progress update of the batch or of a row.
pub struct TerminalSurface {
    document: MemorySurface,
    multi: MultiProgress,
    batch: Mutex<Option<ProgressBar>>,
    rows: Mutex<BTreeMap<String, ProgressBar>>,
}

impl TerminalSurface {
    /// Wrap a document; `hidden` suppresses all drawing.
    pub fn new(document: MemorySurface, hidden: bool) -> Self {
        let target = if hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        Self {
            document,
            multi: MultiProgress::with_draw_target(target),
            batch: Mutex::new(None),
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Underlying document.
    pub fn document(&self) -> &MemorySurface {
        &self.document
    }

    /// Stop drawing and leave the bars as they are.
    pub fn finish(&self) {
        if let Some(bar) = self.batch.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            bar.abandon();
        }
        for bar in self.rows.lock().unwrap_or_else(PoisonError::into_inner).values() {
            bar.abandon();
        }
    }

    fn new_bar(&self, template: &str, prefix: String) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(style(template));
        bar.set_prefix(prefix);
        bar
    }
}

impl Surface for TerminalSurface {
    fn is_loading(&self) -> bool {
        self.document.is_loading()
    }

    fn operation_ids(&self) -> Vec<String> {
        self.document.operation_ids()
    }

    fn find(&self, target: &Target) -> bool {
        self.document.find(target)
    }

    fn text(&self, target: &Target) -> Option<String> {
        self.document.text(target)
    }

    fn set_html(&self, target: &Target, html: &str) {
        self.document.set_html(target, html);
    }

    fn set_text(&self, target: &Target, text: &str) {
        self.document.set_text(target, text);
    }

    fn add_class(&self, target: &Target, class: &str) {
        self.document.add_class(target, class);
    }

    fn remove_class(&self, target: &Target, class: &str) {
        self.document.remove_class(target, class);
    }

    fn on_progress(&self, command: &RenderCommand) {
        match command {
            RenderCommand::Batch {
                label,
                percentage,
                counts,
                ..
            } => {
                let mut batch = self.batch.lock().unwrap_or_else(PoisonError::into_inner);
                let bar = batch.get_or_insert_with(|| self.new_bar(BATCH_TEMPLATE, "batch".into()));
                bar.set_position(u64::from(*percentage));
                match counts {
                    Some((completed, total)) => {
                        bar.set_message(format!("{} ({}/{})", label, completed, total))
                    }
                    None => bar.set_message(label.clone()),
                }
            }
            RenderCommand::Operation {
                operation_id,
                status,
                percentage,
            } => {
                let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
                let bar = rows
                    .entry(operation_id.clone())
                    .or_insert_with(|| self.new_bar(ROW_TEMPLATE, operation_id.clone()));
                bar.set_position(u64::from(*percentage));
                bar.set_message(status.token());
            }
            _ => {}
        }
    }
}
