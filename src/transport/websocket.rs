//! Reconnecting WebSocket connection task.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ReconnectPolicy;
use crate::error::ProgressError;

use super::{TransportEvent, ABNORMAL_CLOSURE};

/// Close code used when the peer sent a close frame without a code.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Deliver an event; `false` once the session stopped listening.
async fn emit(sender: &mpsc::Sender<TransportEvent>, event: TransportEvent) -> bool {
    sender.send(event).await.is_ok()
}

/// Connect, forward messages, and reconnect with a fixed interval.
///
/// Gives up after `max_retries` consecutive failed connection attempts. A
/// successful open resets the count.
pub(super) async fn run(
    url: Url,
    policy: ReconnectPolicy,
    sender: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            attempt = tokio::time::timeout(policy.connect_timeout(), connect_async(url.as_str())) => attempt,
        };

        let mut stream = match attempt {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                failures += 1;
                let err = ProgressError::from(e);
                log::warn!("Connection to {} failed: {}", url, err);
                if !emit(&sender, TransportEvent::Error(err.to_string())).await {
                    return;
                }
                if failures > policy.max_retries {
                    log::error!("Giving up on {} after {} attempts", url, failures);
                    return;
                }
                if !wait_retry(&policy, &cancel).await {
                    return;
                }
                continue;
            }
            Err(_) => {
                failures += 1;
                let err = ProgressError::Transport(format!(
                    "connection timed out after {} ms",
                    policy.connect_timeout_ms
                ));
                log::warn!("Connection to {} failed: {}", url, err);
                if !emit(&sender, TransportEvent::Error(err.to_string())).await {
                    return;
                }
                if failures > policy.max_retries {
                    log::error!("Giving up on {} after {} attempts", url, failures);
                    return;
                }
                if !wait_retry(&policy, &cancel).await {
                    return;
                }
                continue;
            }
        };

        failures = 0;
        if !emit(&sender, TransportEvent::Open).await {
            let _ = stream.close(None).await;
            return;
        }

        let (code, reason) = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = stream.close(None).await;
                    return;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    if !emit(&sender, TransportEvent::Message(text)).await {
                        let _ = stream.close(None).await;
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let err = ProgressError::from(e);
                    log::debug!("Connection to {} dropped: {}", url, err);
                    if !emit(&sender, TransportEvent::Error(err.to_string())).await {
                        return;
                    }
                    break (ABNORMAL_CLOSURE, String::new());
                }
                None => break (ABNORMAL_CLOSURE, String::new()),
            }
        };

        if !emit(&sender, TransportEvent::Close { code, reason }).await {
            return;
        }
        if !wait_retry(&policy, &cancel).await {
            return;
        }
    }
}

/// Sleep for the retry interval; `false` if cancelled meanwhile.
async fn wait_retry(policy: &ReconnectPolicy, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(policy.retry_interval()) => true,
    }
}
