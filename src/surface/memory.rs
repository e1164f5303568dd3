//! In-memory document surface.
//!
//! Holds a snapshot of the rendered page and records every fragment applied
//! to it. Used by the command-line host and by tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::render::{Field, Fragment, FragmentOp, Target};

use super::Surface;

/// A table row as rendered before any push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSnapshot {
    /// Row identifier.
    pub operation_id: String,
    /// Text shown in the status cell.
    #[serde(default)]
    pub status: String,
}

/// The rendered page the view attaches to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSnapshot {
    /// Whether the document is still loading.
    pub loading: bool,
    /// Operation rows.
    pub rows: Vec<RowSnapshot>,
    /// Main status text; the field is absent when `None`.
    pub status: Option<String>,
    /// Read-only batch fields present on the page.
    pub fields: BTreeMap<Field, String>,
}

impl DocumentSnapshot {
    /// Parse a snapshot from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// State of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Text content.
    pub text: Option<String>,
    /// Inner markup, once replaced.
    pub html: Option<String>,
    /// Classes.
    pub classes: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    loading: bool,
    rows: Vec<String>,
    nodes: BTreeMap<Target, Node>,
    history: Vec<Fragment>,
}

/// Shared in-memory document.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySurface {
    /// Create an empty, ready document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a snapshot.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Self {
        let surface = Self::new();
        surface.set_loading(snapshot.loading);
        for row in &snapshot.rows {
            surface.add_row(&row.operation_id, &row.status);
        }
        if let Some(status) = &snapshot.status {
            surface.insert_text(Target::MainStatus, status);
        }
        for (field, text) in &snapshot.fields {
            surface.insert_text(Target::Field(*field), text);
        }
        surface
    }

    /// Load a snapshot from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_snapshot(&DocumentSnapshot::from_json(&text)?))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an element holding `text`, replacing any previous one.
    pub fn insert_text(&self, target: Target, text: &str) {
        self.lock().nodes.insert(
            target,
            Node {
                text: Some(text.to_string()),
                ..Default::default()
            },
        );
    }

    /// Add an operation row with its status cell text.
    pub fn add_row(&self, operation_id: &str, status_text: &str) {
        self.lock().rows.push(operation_id.to_string());
        self.insert_text(Target::Row(operation_id.to_string()), "");
        self.insert_text(Target::StatusCell(operation_id.to_string()), status_text);
    }

    /// Mark the document as loading or ready.
    pub fn set_loading(&self, loading: bool) {
        self.lock().loading = loading;
    }

    /// Current state of a target.
    pub fn node(&self, target: &Target) -> Option<Node> {
        self.lock().nodes.get(target).cloned()
    }

    /// Check if a target currently has a class.
    pub fn has_class(&self, target: &Target, class: &str) -> bool {
        self.node(target)
            .map(|node| node.classes.contains(class))
            .unwrap_or(false)
    }

    /// Every fragment applied so far, in order.
    pub fn history(&self) -> Vec<Fragment> {
        self.lock().history.clone()
    }

    /// All elements keyed by their display name.
    pub fn nodes(&self) -> BTreeMap<String, Node> {
        self.lock()
            .nodes
            .iter()
            .map(|(target, node)| (target.to_string(), node.clone()))
            .collect()
    }

    fn mutate(&self, target: &Target, op: FragmentOp, change: impl FnOnce(&mut Node)) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(node) = inner.nodes.get_mut(target) {
            change(node);
            inner.history.push(Fragment::new(target.clone(), op));
        }
    }
}

impl Surface for MemorySurface {
    fn is_loading(&self) -> bool {
        self.lock().loading
    }

    fn operation_ids(&self) -> Vec<String> {
        self.lock().rows.clone()
    }

    fn find(&self, target: &Target) -> bool {
        self.lock().nodes.contains_key(target)
    }

    fn text(&self, target: &Target) -> Option<String> {
        self.lock()
            .nodes
            .get(target)
            .and_then(|node| node.text.as_deref())
            .map(|text| text.trim().to_string())
    }

    fn set_html(&self, target: &Target, html: &str) {
        self.mutate(target, FragmentOp::SetHtml(html.to_string()), |node| {
            node.html = Some(html.to_string());
        });
    }

    fn set_text(&self, target: &Target, text: &str) {
        self.mutate(target, FragmentOp::SetText(text.to_string()), |node| {
            node.text = Some(text.to_string());
            node.html = None;
        });
    }

    fn add_class(&self, target: &Target, class: &str) {
        self.mutate(target, FragmentOp::AddClass(class.to_string()), |node| {
            node.classes.insert(class.to_string());
        });
    }

    fn remove_class(&self, target: &Target, class: &str) {
        self.mutate(target, FragmentOp::RemoveClass(class.to_string()), |node| {
            node.classes.remove(class);
        });
    }
}
