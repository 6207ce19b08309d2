//! Synchronous publish/subscribe bus for one report section.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use super::signal::{SectionState, Signal, SignalKind};

type Handler = Arc<dyn Fn(&Signal) + Send + Sync>;

/// What happened to a published signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Delivered, together with any signals it triggered, to this many
    /// handler invocations.
    Delivered(usize),
    /// Published before the section was ready.
    Dropped,
    /// A signal of the same kind was already emitted in this pass.
    Suppressed,
    /// Published from inside a handler; delivered later in the same pass.
    Queued,
}

#[derive(Default)]
struct Pass {
    emitted: HashSet<SignalKind>,
    queue: VecDeque<Signal>,
}

struct Inner {
    state: SectionState,
    next_id: u64,
    handlers: Vec<(u64, SignalKind, Handler)>,
    pass: Option<Pass>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ends the current pass even if a handler panics.
struct PassGuard<'a>(&'a Mutex<Inner>);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).pass = None;
    }
}

/// Shared signal bus for one report section.
///
/// Handlers run on the publisher's thread with no bus lock held, so they
/// may publish, subscribe or detach freely. One top-level publish starts a
/// pass: signals published by handlers during the pass are queued and
/// delivered before the outer publish returns, and each signal kind is
/// emitted at most once per pass. A view that answers `FilteredRowsChanged`
/// by re-publishing `SelectionChanged` therefore cannot start a cascade.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    name: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("subscribers", &inner.handlers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: SectionState::Uninitialized,
                next_id: 0,
                handlers: Vec::new(),
                pass: None,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SectionState {
        lock(&self.inner).state
    }

    /// Move the section to a new lifecycle state.
    pub fn set_state(&self, state: SectionState) {
        let previous = std::mem::replace(&mut lock(&self.inner).state, state);
        if previous != state {
            debug!(bus = %self.name, from = ?previous, to = ?state, "Section state changed");
        }
    }

    /// Attach a handler for one signal kind. The handler stays attached
    /// until the returned [`Subscription`] is dropped or detached.
    pub fn subscribe<F>(&self, kind: SignalKind, handler: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, kind, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).handlers.len()
    }

    /// Publish a signal to every handler subscribed to its kind.
    pub fn publish(&self, signal: Signal) -> PublishOutcome {
        let kind = signal.kind();
        {
            let mut inner = lock(&self.inner);

            if kind.requires_ready() && inner.state != SectionState::Ready {
                debug!(bus = %self.name, %kind, state = ?inner.state, "Dropped signal before ready");
                return PublishOutcome::Dropped;
            }

            if let Some(pass) = inner.pass.as_mut() {
                if !pass.emitted.insert(kind) {
                    debug!(bus = %self.name, %kind, "Suppressed repeated signal in pass");
                    return PublishOutcome::Suppressed;
                }
                pass.queue.push_back(signal);
                return PublishOutcome::Queued;
            }

            let mut pass = Pass::default();
            pass.emitted.insert(kind);
            inner.pass = Some(pass);
        }

        let _pass = PassGuard(&self.inner);
        let mut delivered = self.deliver(&signal);
        loop {
            let next = lock(&self.inner)
                .pass
                .as_mut()
                .and_then(|pass| pass.queue.pop_front());
            match next {
                Some(queued) => delivered += self.deliver(&queued),
                None => break,
            }
        }
        PublishOutcome::Delivered(delivered)
    }

    fn deliver(&self, signal: &Signal) -> usize {
        let kind = signal.kind();
        let handlers: Vec<Handler> = lock(&self.inner)
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();

        for handler in &handlers {
            handler(signal);
        }
        handlers.len()
    }
}

/// Handle for an attached handler; detaches on drop.
#[must_use = "dropping a Subscription detaches its handler"]
pub struct Subscription {
    bus: Weak<Mutex<Inner>>,
    id: u64,
}

impl Subscription {
    /// Detach now.
    pub fn detach(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock(&inner).handlers.retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::store::Predicate;

    fn ready_bus() -> EventBus {
        let bus = EventBus::new("test");
        bus.set_state(SectionState::Ready);
        bus
    }

    #[test]
    fn test_delivery_and_detach() {
        let bus = ready_bus();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sub = bus.subscribe(SignalKind::RefreshNeeded, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(Signal::RefreshNeeded("x".into())), PublishOutcome::Delivered(1));
        sub.detach();
        assert_eq!(bus.publish(Signal::RefreshNeeded("x".into())), PublishOutcome::Delivered(0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_before_ready() {
        let bus = EventBus::new("test");
        let _sub = bus.subscribe(SignalKind::SelectionChanged, |_| panic!("must not run"));

        assert_eq!(bus.publish(Signal::SelectionChanged(Predicate::all())), PublishOutcome::Dropped);
        bus.set_state(SectionState::Loading);
        assert_eq!(bus.publish(Signal::SelectionChanged(Predicate::all())), PublishOutcome::Dropped);
    }

    #[test]
    fn test_refresh_allowed_while_loading() {
        let bus = EventBus::new("test");
        bus.set_state(SectionState::Loading);
        assert_eq!(bus.publish(Signal::RefreshNeeded("x".into())), PublishOutcome::Delivered(0));
    }

    #[test]
    fn test_kind_filtering() {
        let bus = ready_bus();
        let _sub = bus.subscribe(SignalKind::FilteredRowsChanged, |_| panic!("wrong kind"));
        assert_eq!(bus.publish(Signal::RefreshNeeded("x".into())), PublishOutcome::Delivered(0));
    }
}
