//! Rendering collaborator.
//!
//! A [`Surface`] is the document the progress view lives in. It is handed to
//! the session at construction time and offers the small capability set the
//! engine needs: find, read text, set markup or text, and toggle classes.

mod memory;

pub use memory::{DocumentSnapshot, MemorySurface, Node, RowSnapshot};

use crate::render::{render, Fragment, FragmentOp, RenderCommand, Target};

/// Trait for documents that display batch progress.
///
/// Mutations on targets that do not exist must be silent no-ops.
///
/// # Example
///
/// ```rust,ignore
/// use batch_progress::surface::Surface;
/// use batch_progress::render::{RenderCommand, Target};
///
/// struct LogSurface;
///
/// impl Surface for LogSurface {
///     fn operation_ids(&self) -> Vec<String> { Vec::new() }
///     fn find(&self, _target: &Target) -> bool { true }
///     fn text(&self, _target: &Target) -> Option<String> { None }
///     fn set_html(&self, target: &Target, html: &str) { println!("{} <- {}", target, html); }
///     fn set_text(&self, target: &Target, text: &str) { println!("{} <- {}", target, text); }
///     fn add_class(&self, _target: &Target, _class: &str) {}
///     fn remove_class(&self, _target: &Target, _class: &str) {}
/// }
/// ```
pub trait Surface: Send + Sync {
    /// Whether the document is still loading.
    fn is_loading(&self) -> bool {
        false
    }

    /// Whether the helpers used to mutate the document are available yet.
    fn collaborator_ready(&self) -> bool {
        true
    }

    /// Identifiers of the operation rows currently in the table.
    fn operation_ids(&self) -> Vec<String>;

    /// Check if a target exists.
    fn find(&self, target: &Target) -> bool;

    /// Trimmed text content of a target.
    fn text(&self, target: &Target) -> Option<String>;

    /// Replace a target's markup.
    fn set_html(&self, target: &Target, html: &str);

    /// Replace a target's text.
    fn set_text(&self, target: &Target, text: &str);

    /// Add a class to a target.
    fn add_class(&self, target: &Target, class: &str);

    /// Remove a class from a target.
    fn remove_class(&self, target: &Target, class: &str);

    /// Called after a command carrying a percentage has been applied.
    fn on_progress(&self, command: &RenderCommand) {
        // Default implementation does nothing
        let _ = command;
    }

    /// Apply one fragment, skipping targets that are not present.
    fn apply(&self, fragment: &Fragment) {
        if !self.find(&fragment.target) {
            log::debug!("Skipping fragment for missing {}", fragment.target);
            return;
        }
        match &fragment.op {
            FragmentOp::SetHtml(html) => self.set_html(&fragment.target, html),
            FragmentOp::SetText(text) => self.set_text(&fragment.target, text),
            FragmentOp::AddClass(class) => self.add_class(&fragment.target, class),
            FragmentOp::RemoveClass(class) => self.remove_class(&fragment.target, class),
        }
    }
}

/// Render a command and apply the result to a surface.
pub fn apply_command<S: Surface + ?Sized>(surface: &S, command: &RenderCommand) {
    for fragment in render(command) {
        surface.apply(&fragment);
    }
    if command.percentage().is_some() {
        surface.on_progress(command);
    }
}
