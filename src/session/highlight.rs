//! Transient row highlights.
//!
//! Every update schedules its own one-shot clear; later updates never cancel
//! or extend earlier timers. Each timer captures a monotonically increasing
//! update id and is discarded if teardown happened after it was scheduled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::render::Fragment;
use crate::surface::Surface;

/// Issues update ids and records teardown.
#[derive(Debug, Clone, Default)]
pub struct HighlightClock {
    last_id: Arc<AtomicU64>,
    /// Zero while live; otherwise one past the last id issued before teardown.
    teardown_id: Arc<AtomicU64>,
}

impl HighlightClock {
    /// Create a live clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next update id, starting at 1.
    pub fn next_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record teardown; every id issued so far becomes stale.
    pub fn teardown(&self) {
        let teardown_id = self.last_id.load(Ordering::SeqCst) + 1;
        // Only the first teardown counts.
        let _ = self
            .teardown_id
            .compare_exchange(0, teardown_id, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Check if a callback captured with `id` may still touch the document.
    pub fn is_live(&self, id: u64) -> bool {
        let teardown_id = self.teardown_id.load(Ordering::SeqCst);
        teardown_id == 0 || teardown_id <= id
    }

    /// Check if teardown was recorded.
    pub fn is_torn_down(&self) -> bool {
        self.teardown_id.load(Ordering::SeqCst) != 0
    }

    /// Apply `clear` to the surface after `delay`, unless torn down by then.
    pub fn schedule<S>(&self, surface: Arc<S>, clear: Fragment, delay: Duration) -> JoinHandle<()>
    where
        S: Surface + ?Sized + 'static,
    {
        let id = self.next_id();
        let clock = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if clock.is_live(id) {
                surface.apply(&clear);
            } else {
                log::debug!("Dropping highlight clear {} after teardown", id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{highlight, Target, HIGHLIGHT_CLASS};
    use crate::surface::MemorySurface;

    #[test]
    fn test_ids_are_monotonic() {
        let clock = HighlightClock::new();
        assert_eq!(clock.next_id(), 1);
        assert_eq!(clock.next_id(), 2);
        assert!(clock.is_live(1));

        clock.teardown();
        assert!(clock.is_torn_down());
        assert!(!clock.is_live(1));
        assert!(!clock.is_live(2));

        clock.next_id();
        clock.teardown();
        assert!(!clock.is_live(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_clear_runs() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "-");
        let (on, off) = highlight("op-1");
        surface.apply(&on);

        let clock = HighlightClock::new();
        let handle = clock.schedule(Arc::new(surface.clone()), off, Duration::from_millis(1000));
        handle.await.unwrap();

        assert!(!surface.has_class(&Target::Row("op-1".into()), HIGHLIGHT_CLASS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_after_teardown_is_dropped() {
        let surface = MemorySurface::new();
        surface.add_row("op-1", "-");
        let (on, off) = highlight("op-1");
        surface.apply(&on);

        let clock = HighlightClock::new();
        let handle = clock.schedule(Arc::new(surface.clone()), off, Duration::from_millis(1000));
        clock.teardown();
        handle.await.unwrap();

        assert!(surface.has_class(&Target::Row("op-1".into()), HIGHLIGHT_CLASS));
    }
}
