//! Batch Upgrade Progress Library
//!
//! Reconciles live progress pushed over a WebSocket for a batch firmware
//! upgrade with the status already rendered on the batch page.
//!
//! # Features
//!
//! - **Status classification**: free-text labels mapped to a closed set of statuses
//! - **Monotonic progress**: operation bars never move backwards
//! - **Aggregate tracking**: batch percentage from completed/total, forced to 100 when finished
//! - **Seeding**: initial state recovered from the rendered page
//! - **Resilient streaming**: malformed messages are dropped, the connection reconnects
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use batch_progress::{BatchView, Location, MemorySurface, Teardown, WatchConfig};
//!
//! let surface = Arc::new(MemorySurface::from_json_file("page.json".as_ref())?);
//! let location = Location::parse(
//!     "https://example.com/admin/firmware_upgrader/batchupgradeoperation/42/change/",
//! )?;
//!
//! if let Some(view) =
//!     BatchView::attach(WatchConfig::default(), &location, surface, Teardown::new()).await?
//! {
//!     let stats = view.run_websocket().await;
//!     println!("{}", stats);
//! }
//! ```
//!
//! # Progress Rules
//!
//! - **Operations**: the displayed percentage only grows, and a row is frozen
//!   once it reaches success, failed or aborted
//! - **Batch**: while in progress the completed/total ratio is authoritative
//!   and may move down; success and failed always display 100%

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod merge;
pub mod render;
pub mod session;
pub mod status;
pub mod surface;
pub mod table;
pub mod transport;

// Re-export commonly used types
pub use aggregate::{AggregateTracker, BatchProgress, Rates};
pub use config::{ReconnectPolicy, WatchConfig};
pub use dispatch::{DispatchStats, Dispatcher, InboundEvent};
pub use error::{ProgressError, Result};
pub use merge::{merge, EntityKind};
pub use render::{render, Field, Fragment, FragmentOp, RenderCommand, Target};
pub use session::{BatchView, Location, Teardown};
pub use status::{classify, OperationStatus};
pub use surface::{DocumentSnapshot, MemorySurface, Surface};
pub use table::{OperationProgress, RowIndex, Upsert};
pub use transport::{TransportEvent, TransportHandle};

/// Library version information.
pub mod version {
    /// Library version string.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Library name.
    pub const NAME: &str = env!("CARGO_PKG_NAME");

    /// Get full version string.
    pub fn full_version() -> String {
        format!("{} {}", NAME, VERSION)
    }
}
