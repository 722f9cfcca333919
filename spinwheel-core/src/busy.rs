//! Process-wide count of in-flight operations and the derived busy signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

#[derive(Debug)]
struct Inner {
    count: AtomicUsize,
    busy: watch::Sender<bool>,
}

/// Shared between every operation that should light the loading indicator.
/// Clones share one counter.
#[derive(Debug, Clone)]
pub struct BusyCounter {
    inner: Arc<Inner>,
}

impl Default for BusyCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyCounter {
    pub fn new() -> Self {
        let (busy, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                count: AtomicUsize::new(0),
                busy,
            }),
        }
    }

    pub fn show(&self) {
        self.inner.count.fetch_add(1, Ordering::AcqRel);
        self.publish();
    }

    /// Never drops below zero; an unmatched `hide` is ignored.
    pub fn hide(&self) {
        let decremented = self
            .inner
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if decremented.is_err() {
            tracing::debug!("busy counter hide() without matching show()");
        }
        self.publish();
    }

    /// Increment now, decrement when the guard drops (including on error paths and unwinding).
    pub fn enter(&self) -> BusyGuard {
        self.show();
        BusyGuard {
            counter: self.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        *self.inner.busy.borrow()
    }

    /// Notified only when the busy flag flips.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.busy.subscribe()
    }

    // Re-reads the count under the channel lock so the last publisher always
    // leaves the flag matching the final count.
    fn publish(&self) {
        self.inner.busy.send_if_modified(|busy| {
            let now = self.inner.count.load(Ordering::Acquire) > 0;
            if *busy == now {
                false
            } else {
                *busy = now;
                true
            }
        });
    }
}

#[must_use = "the operation counts as busy only while the guard is alive"]
#[derive(Debug)]
pub struct BusyGuard {
    counter: BusyCounter,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.counter.hide();
    }
}
