//! Batch view lifecycle.
//!
//! [`BatchView::attach`] runs the initialization sequence once per view:
//! wait for the document, wait for the rendering collaborator, resolve the
//! batch identifier, seed state from what is already rendered, and derive
//! the streaming endpoint. [`BatchView::run`] then drives the live loop
//! until the transport finishes or the view is torn down.

mod highlight;
mod location;
mod readiness;
mod seed;

pub use highlight::HighlightClock;
pub use location::{websocket_endpoint, Location};
pub use readiness::wait_until;
pub use seed::{seed_from_surface, Seeded};

use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use url::Url;

use crate::config::WatchConfig;
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::error::{ProgressError, Result};
use crate::render::{highlight, RenderCommand};
use crate::surface::{apply_command, Surface};
use crate::transport::{TransportEvent, TransportHandle};

/// Teardown signal shared by a view, its transport loop and its timers.
#[derive(Debug, Clone, Default)]
pub struct Teardown {
    cancel: CancellationToken,
    clock: HighlightClock,
}

impl Teardown {
    /// Create a live teardown signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear the view down. Pending timers become no-ops.
    pub fn trigger(&self) {
        self.clock.teardown();
        self.cancel.cancel();
    }

    /// Check if teardown was triggered.
    pub fn is_triggered(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once teardown is triggered.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Highlight clock tied to this teardown.
    pub fn clock(&self) -> &HighlightClock {
        &self.clock
    }
}

/// Live progress view of one batch.
pub struct BatchView<S: Surface + 'static> {
    batch_id: String,
    endpoint: Url,
    config: WatchConfig,
    surface: Arc<S>,
    dispatcher: Dispatcher,
    teardown: Teardown,
}

impl<S: Surface + 'static> BatchView<S> {
    /// Attach a view to the batch named by `location`.
    ///
    /// Returns `Ok(None)` when initialization is abandoned: no batch
    /// identifier in the location, or no host to connect to. Both cases are
    /// logged and leave no transport open.
    pub async fn attach(
        config: WatchConfig,
        location: &Location,
        surface: Arc<S>,
        teardown: Teardown,
    ) -> Result<Option<Self>> {
        config.validate()?;
        let interval = config.poll_interval();

        let polls = wait_until(|| !surface.is_loading(), interval, teardown.token()).await?;
        if polls > 0 {
            log::debug!("Document ready after {} polls", polls);
        }

        let polls = wait_until(|| surface.collaborator_ready(), interval, teardown.token()).await?;
        if polls > 0 {
            log::debug!("Rendering collaborator available after {} polls", polls);
        }

        let batch_id = match location.batch_id(&config.batch_path_segment) {
            Some(id) => id,
            None => {
                let err = ProgressError::MissingBatchId {
                    path: location.path.clone(),
                };
                log::warn!("{}", err);
                return Ok(None);
            }
        };

        let seeded = seed_from_surface(surface.as_ref());
        for command in &seeded.commands {
            apply_command(surface.as_ref(), command);
        }

        let endpoint = match websocket_endpoint(location, &config, &batch_id) {
            Ok(endpoint) => endpoint,
            Err(ProgressError::MissingHost) => {
                log::error!("{}", ProgressError::MissingHost);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        log::info!("Batch {} streams from {}", batch_id, endpoint);

        Ok(Some(Self {
            batch_id,
            endpoint,
            config,
            surface,
            dispatcher: Dispatcher::new(seeded.rows, seeded.aggregate),
            teardown,
        }))
    }

    /// Handle one raw message and apply the result to the surface.
    ///
    /// Every operation update highlights its row and schedules an independent
    /// clear. Must be called from within a tokio runtime.
    pub fn handle_message(&mut self, raw: &str) -> Vec<RenderCommand> {
        if self.teardown.is_triggered() {
            log::debug!("Ignoring message after teardown");
            return Vec::new();
        }

        let commands = self.dispatcher.handle(raw);
        for command in &commands {
            apply_command(self.surface.as_ref(), command);

            if let RenderCommand::Operation { operation_id, .. } = command {
                let (on, off) = highlight(operation_id);
                self.surface.apply(&on);
                self.teardown
                    .clock()
                    .schedule(self.surface.clone(), off, self.config.highlight_window());
            }
        }
        commands
    }

    /// Drive the view from `transport` until it finishes or teardown.
    pub async fn run(mut self, mut transport: TransportHandle) -> DispatchStats {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.teardown.cancelled() => {
                    log::info!("Batch {} view torn down", self.batch_id);
                    break;
                }
                event = transport.next() => event,
            };

            match event {
                Some(TransportEvent::Open) => {
                    log::info!("WebSocket connected for batch {}", self.batch_id);
                }
                Some(TransportEvent::Message(raw)) => {
                    self.handle_message(&raw);
                }
                Some(close @ TransportEvent::Close { .. }) => {
                    if close.is_abnormal_close() {
                        log::error!("WebSocket closed unexpectedly: {:?}", close);
                    } else {
                        log::info!("WebSocket closed: {:?}", close);
                    }
                }
                Some(TransportEvent::Error(e)) => {
                    log::error!("WebSocket error: {}", e);
                }
                None => {
                    log::info!("Transport for batch {} finished", self.batch_id);
                    break;
                }
            }
        }

        transport.join().await;
        let stats = self.dispatcher.stats();
        log::info!("Batch {}: {}", self.batch_id, stats);
        stats
    }

    /// Open the WebSocket endpoint and drive the view from it.
    pub async fn run_websocket(self) -> DispatchStats {
        let transport = TransportHandle::websocket(self.endpoint.clone(), self.config.reconnect);
        self.run(transport).await
    }

    /// Batch identifier taken from the location.
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Streaming endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Dispatcher holding the reconciled state.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Teardown signal of this view.
    pub fn teardown(&self) -> &Teardown {
        &self.teardown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::render::{Field, FragmentOp, Target, HIGHLIGHT_CLASS};
    use crate::status::OperationStatus;
    use crate::surface::MemorySurface;

    const PAGE: &str = "/admin/firmware_upgrader/batchupgradeoperation/42/change/";

    fn location() -> Location {
        Location::new(false, "localhost:8000", PAGE)
    }

    async fn attach(surface: &MemorySurface) -> BatchView<MemorySurface> {
        BatchView::attach(
            WatchConfig::default(),
            &location(),
            Arc::new(surface.clone()),
            Teardown::new(),
        )
        .await
        .unwrap()
        .expect("view should attach")
    }

    fn row_removals(surface: &MemorySurface, id: &str) -> usize {
        let row = Target::Row(id.to_string());
        surface
            .history()
            .iter()
            .filter(|f| f.target == row && matches!(&f.op, FragmentOp::RemoveClass(c) if c == HIGHLIGHT_CLASS))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_scenario() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "in progress");
        surface.insert_text(Target::MainStatus, "in progress");
        surface.insert_text(Target::Field(Field::Completed), "5 out of 10");

        let mut view = attach(&surface).await;
        assert_eq!(view.batch_id(), "42");
        assert_eq!(view.endpoint().as_str(), "ws://localhost:8000/ws/batch-upgrade/42/");
        assert_eq!(view.dispatcher().aggregate().progress().percentage(), 50);

        view.handle_message(r#"{"type":"batch_status","completed":7,"total":10,"status":"in-progress"}"#);
        assert_eq!(view.dispatcher().aggregate().progress().percentage(), 70);
        let html = surface.node(&Target::MainStatus).unwrap().html.unwrap();
        assert!(html.contains("70% (7/10)"));

        view.handle_message(r#"{"type":"batch_status","completed":7,"total":10,"status":"success"}"#);
        assert_eq!(view.dispatcher().aggregate().progress().percentage(), 100);
        let html = surface.node(&Target::MainStatus).unwrap().html.unwrap();
        assert!(html.contains("100% (7/10)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_row_scenario() {
        let surface = MemorySurface::new();
        surface.add_row("op-42", "-");

        let mut view = attach(&surface).await;
        let cell = Target::StatusCell("op-42".into());
        assert!(surface.node(&cell).unwrap().html.is_none());

        view.handle_message(r#"{"type":"operation_progress","operation_id":"op-42","status":"failed","progress":30}"#);
        assert!(surface.node(&cell).unwrap().html.unwrap().contains("width: 30%"));

        view.handle_message(r#"{"type":"operation_progress","operation_id":"op-42","status":"failed","progress":10}"#);
        let row = view.dispatcher().rows().get("op-42").unwrap();
        assert_eq!(row.status, OperationStatus::Failed);
        assert_eq!(row.percentage, 30);
        assert!(surface.node(&cell).unwrap().html.unwrap().contains("width: 30%"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_batch_id_abandons_attach() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "in progress");

        let view = BatchView::attach(
            WatchConfig::default(),
            &Location::new(false, "localhost", "/admin/firmware_upgrader/build/"),
            Arc::new(surface.clone()),
            Teardown::new(),
        )
        .await
        .unwrap();

        assert!(view.is_none());
        assert!(surface.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_host_still_seeds() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "success");

        let view = BatchView::attach(
            WatchConfig::default(),
            &Location::new(false, "", PAGE),
            Arc::new(surface.clone()),
            Teardown::new(),
        )
        .await
        .unwrap();

        assert!(view.is_none());
        assert!(!surface.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_waits_for_document() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "-");
        surface.set_loading(true);

        let loader = surface.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            loader.set_loading(false);
        });

        let view = attach(&surface).await;
        assert_eq!(view.dispatcher().rows().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_cancelled_while_loading() {
        let surface = MemorySurface::new();
        surface.set_loading(true);
        let teardown = Teardown::new();

        let trigger = teardown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        });

        let result =
            BatchView::attach(WatchConfig::default(), &location(), Arc::new(surface), teardown).await;
        assert!(matches!(result, Err(ProgressError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_highlight_timers_are_independent() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "-");
        let row = Target::Row("op-1".into());
        let mut view = attach(&surface).await;

        let update = r#"{"type":"operation_progress","operation_id":"op-1","status":"in progress","progress":20}"#;
        view.handle_message(update);
        assert!(surface.has_class(&row, HIGHLIGHT_CLASS));

        tokio::time::sleep(Duration::from_millis(600)).await;
        view.handle_message(update);

        // The first clear is not postponed by the second update.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!surface.has_class(&row, HIGHLIGHT_CLASS));
        assert_eq!(row_removals(&surface, "op-1"), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(row_removals(&surface, "op-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_discards_timers_and_messages() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "-");
        let row = Target::Row("op-1".into());
        let mut view = attach(&surface).await;

        view.handle_message(r#"{"type":"operation_progress","operation_id":"op-1","status":"in progress"}"#);
        view.teardown().trigger();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(surface.has_class(&row, HIGHLIGHT_CLASS));
        assert_eq!(row_removals(&surface, "op-1"), 0);

        let before = surface.history().len();
        let commands = view.handle_message(r#"{"type":"operation_progress","operation_id":"op-1","status":"success"}"#);
        assert!(commands.is_empty());
        assert_eq!(surface.history().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_malformed_message() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "-");
        let view = attach(&surface).await;

        let (sender, transport) = TransportHandle::channel();
        let events = vec![
            TransportEvent::Open,
            TransportEvent::Message(
                r#"{"type":"operation_progress","operation_id":"op-1","status":"in progress","progress":40}"#.into(),
            ),
            TransportEvent::Message("{not json".into()),
            TransportEvent::Message(
                r#"{"type":"operation_progress","operation_id":"op-1","status":"in progress","progress":60}"#.into(),
            ),
            TransportEvent::Message(r#"{"type":"device_heartbeat"}"#.into()),
            TransportEvent::Close {
                code: 1006,
                reason: String::new(),
            },
        ];
        for event in events {
            sender.send(event).await.unwrap();
        }
        drop(sender);

        let stats = view.run(transport).await;
        assert_eq!(stats.received, 4);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.operation_updates, 2);

        let cell = surface.node(&Target::StatusCell("op-1".into())).unwrap();
        assert!(cell.html.unwrap().contains("width: 60%"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_teardown() {
        let surface = MemorySurface::new();
        let view = attach(&surface).await;
        let teardown = view.teardown().clone();

        let (_sender, transport) = TransportHandle::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            teardown.trigger();
        });

        let stats = view.run(transport).await;
        assert_eq!(stats.received, 0);
    }
}
