//! Accumulated state of one logical session (the primary story, the comparison, ...).
//!
//! Every mutation publishes a new immutable snapshot; a snapshot handed out
//! earlier is never changed afterwards. Sessions share nothing, so any number
//! of them can be created and reset independently.
//!
//! `reset` starts a new epoch and returns the only writer allowed to mutate
//! it. Writers from older epochs are refused, which keeps a slow stream that
//! lost its session from writing into the one that replaced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::model::GeneratedTextSources;

pub type SessionState = GeneratedTextSources;
pub type Snapshot = Arc<SessionState>;

type Observer = Arc<dyn Fn(&Snapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Slot {
    epoch: u64,
    current: Snapshot,
}

struct Inner {
    label: String,
    /// Held from building a snapshot until every observer has seen it, so
    /// observers receive snapshots in publish order. Taken before `slot`.
    publish: Mutex<()>,
    slot: Mutex<Slot>,
    tx: watch::Sender<Snapshot>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

// Snapshots are replaced wholesale, so a panic in another holder cannot leave them half-written.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(label: impl Into<String>) -> Self {
        let empty: Snapshot = Arc::new(SessionState::default());
        let (tx, _rx) = watch::channel(empty.clone());
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                publish: Mutex::new(()),
                slot: Mutex::new(Slot {
                    epoch: 0,
                    current: empty,
                }),
                tx,
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn snapshot(&self) -> Snapshot {
        lock(&self.inner.slot).current.clone()
    }

    /// Latest-value subscription for async consumers.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.tx.subscribe()
    }

    /// Register a callback invoked synchronously with every published snapshot.
    /// Callbacks run under the session's publish lock and must not reset or
    /// write to the same session.
    pub fn observe<F>(&self, f: F) -> ObserverId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.observers).push((id, Arc::new(f)));
        id
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.inner.observers);
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    /// Clear the state and start a new epoch. Writers of earlier epochs go stale.
    pub fn reset(&self) -> SessionWriter {
        let _publish = lock(&self.inner.publish);
        let (epoch, snapshot) = {
            let mut slot = lock(&self.inner.slot);
            slot.epoch += 1;
            slot.current = Arc::new(SessionState::default());
            self.inner.tx.send_replace(slot.current.clone());
            (slot.epoch, slot.current.clone())
        };
        self.notify(&snapshot);
        SessionWriter {
            session: self.clone(),
            epoch,
        }
    }

    fn mutate(&self, epoch: u64, f: impl FnOnce(&mut SessionState)) -> bool {
        let _publish = lock(&self.inner.publish);
        let snapshot = {
            let mut slot = lock(&self.inner.slot);
            if slot.epoch != epoch {
                return false;
            }
            let mut next = SessionState::clone(&slot.current);
            f(&mut next);
            slot.current = Arc::new(next);
            self.inner.tx.send_replace(slot.current.clone());
            slot.current.clone()
        };
        self.notify(&snapshot);
        true
    }

    fn notify(&self, snapshot: &Snapshot) {
        let observers: Vec<Observer> = lock(&self.inner.observers)
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            observer(snapshot);
        }
    }

    fn current_epoch(&self) -> u64 {
        lock(&self.inner.slot).epoch
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.inner.label)
            .field("epoch", &self.current_epoch())
            .finish()
    }
}

/// Write access to one epoch of a session. Every method returns `false`
/// once the session has been reset again.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    session: Session,
    epoch: u64,
}

impl SessionWriter {
    /// Append to the generated text; an absent text counts as empty.
    pub fn apply_delta(&self, text: &str) -> bool {
        self.session.mutate(self.epoch, |state| {
            state
                .generated_text
                .get_or_insert_with(String::new)
                .push_str(text);
        })
    }

    /// Replace the source list wholesale.
    pub fn apply_sources(&self, sources: Vec<String>) -> bool {
        self.session.mutate(self.epoch, |state| state.sources = sources)
    }

    pub fn is_current(&self) -> bool {
        self.session.current_epoch() == self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_in_arrival_order() {
        let session = Session::new("story");
        let w = session.reset();
        assert!(w.apply_delta("a"));
        assert!(w.apply_delta("bc"));
        assert!(w.apply_delta("d"));
        assert_eq!(session.snapshot().generated_text.as_deref(), Some("abcd"));

        let w = session.reset();
        for d in ["d", "bc", "a"] {
            w.apply_delta(d);
        }
        assert_eq!(session.snapshot().generated_text.as_deref(), Some("dbca"));
    }

    #[test]
    fn sources_replace_instead_of_merge() {
        let session = Session::new("story");
        let w = session.reset();
        w.apply_sources(vec!["http://old".into(), "http://older".into()]);
        w.apply_sources(vec!["http://a".into(), "http://b".into()]);
        assert_eq!(session.snapshot().sources, vec!["http://a", "http://b"]);
        assert_eq!(session.snapshot().generated_text, None);
    }

    #[test]
    fn reset_clears_state() {
        let session = Session::new("story");
        let w = session.reset();
        w.apply_delta("text");
        w.apply_sources(vec!["s".into()]);
        session.reset();
        assert_eq!(*session.snapshot(), SessionState::default());
    }

    #[test]
    fn published_snapshots_are_never_mutated() {
        let session = Session::new("story");
        let w = session.reset();
        w.apply_delta("one");
        let held = session.snapshot();
        w.apply_delta(" two");
        assert_eq!(held.generated_text.as_deref(), Some("one"));
        assert_eq!(session.snapshot().generated_text.as_deref(), Some("one two"));
    }

    #[test]
    fn stale_writer_is_refused() {
        let session = Session::new("story");
        let old = session.reset();
        old.apply_delta("old");
        let fresh = session.reset();
        assert!(!old.is_current());
        assert!(!old.apply_delta(" late"));
        assert!(!old.apply_sources(vec!["x".into()]));
        assert!(fresh.apply_delta("new"));
        assert_eq!(session.snapshot().generated_text.as_deref(), Some("new"));
    }

    #[test]
    fn sessions_are_isolated() {
        let story = Session::new("story");
        let comparison = Session::new("comparison");
        let ws = story.reset();
        let wc = comparison.reset();
        ws.apply_delta("story");
        wc.apply_delta("cmp");
        story.reset();
        assert!(wc.is_current());
        assert_eq!(comparison.snapshot().generated_text.as_deref(), Some("cmp"));
        assert_eq!(story.snapshot().generated_text, None);
    }

    #[test]
    fn observers_see_every_mutation() {
        let session = Session::new("story");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = session.observe(move |snap| {
            sink.lock()
                .unwrap()
                .push(snap.generated_text.clone().unwrap_or_default());
        });
        let w = session.reset();
        w.apply_delta("a");
        w.apply_delta("b");
        assert!(session.unobserve(id));
        w.apply_delta("c");
        assert_eq!(*seen.lock().unwrap(), vec!["", "a", "ab"]);
        assert!(!session.unobserve(id));
    }

    #[test]
    fn observers_finish_on_the_current_snapshot_despite_concurrent_reset() {
        for _ in 0..200 {
            let session = Session::new("story");
            let last: Arc<Mutex<Option<Snapshot>>> = Arc::new(Mutex::new(None));
            let sink = last.clone();
            session.observe(move |snap| *sink.lock().unwrap() = Some(snap.clone()));

            let writer = session.reset();
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let (go_write, go_reset) = (barrier.clone(), barrier);
            let resetter = session.clone();
            let streaming = std::thread::spawn(move || {
                go_write.wait();
                for _ in 0..50 {
                    writer.apply_delta("x");
                }
            });
            let restarting = std::thread::spawn(move || {
                go_reset.wait();
                resetter.reset();
            });
            streaming.join().unwrap();
            restarting.join().unwrap();

            let seen = last.lock().unwrap().clone().unwrap();
            assert!(Arc::ptr_eq(&seen, &session.snapshot()));
            assert!(Arc::ptr_eq(&seen, &session.subscribe().borrow()));
        }
    }

    #[tokio::test]
    async fn watch_subscribers_get_the_latest_snapshot() {
        let session = Session::new("story");
        let mut rx = session.subscribe();
        let w = session.reset();
        w.apply_delta("hello");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().generated_text.as_deref(), Some("hello"));
    }
}
