//! Readiness waits used during initialization.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ProgressError, Result};

/// Poll `probe` every `interval` until it holds.
///
/// There is no retry limit; only cancellation ends the wait early. Returns
/// the number of failed probes before success.
pub async fn wait_until<F>(mut probe: F, interval: Duration, cancel: &CancellationToken) -> Result<u32>
where
    F: FnMut() -> bool,
{
    let mut retries = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ProgressError::Cancelled);
        }
        if probe() {
            return Ok(retries);
        }
        retries += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProgressError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
