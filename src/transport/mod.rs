//! Streaming connection.
//!
//! The session only sees a sequence of [`TransportEvent`]s. Reconnection is
//! owned by the transport; while it is disconnected nothing arrives and the
//! displayed state simply holds.

mod websocket;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ReconnectPolicy;

/// Close code of a connection that dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Buffered events between the connection task and the session.
const EVENT_BUFFER: usize = 256;

/// Something that happened on the streaming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established.
    Open,
    /// Text message received.
    Message(String),
    /// Connection closed.
    Close {
        /// Close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// Connection-level error.
    Error(String),
}

impl TransportEvent {
    /// Check if this is an abnormal closure.
    pub fn is_abnormal_close(&self) -> bool {
        matches!(self, Self::Close { code, .. } if *code == ABNORMAL_CLOSURE)
    }
}

/// Receiving end of a streaming connection.
///
/// Dropping or closing the handle stops the connection task.
pub struct TransportHandle {
    events: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    /// In-process transport fed through a channel.
    pub fn channel() -> (mpsc::Sender<TransportEvent>, Self) {
        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        let handle = Self {
            events,
            cancel: CancellationToken::new(),
            task: None,
        };
        (sender, handle)
    }

    /// Open a reconnecting WebSocket connection.
    ///
    /// Must be called from within a tokio runtime.
    pub fn websocket(url: Url, policy: ReconnectPolicy) -> Self {
        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(websocket::run(url, policy, sender, cancel.clone()));
        Self {
            events,
            cancel,
            task: Some(task),
        }
    }

    /// Next event; `None` once the transport has given up or was closed.
    pub async fn next(&mut self) -> Option<TransportEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Close the connection. No further events are delivered.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.events.close();
    }

    /// Check if the handle was closed.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the connection task to finish after closing.
    pub async fn join(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::debug!("Transport task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
