//! Evaluation Notifications
//!
//! After every non-silent pass the graph raises an [`EvaluationEvent`] to
//! each registered subscriber. Delivery is fire-and-forget: subscribers
//! cannot fail the pass or change its result.
//!
//! Subscriptions are tied to a [`Subscription`] handle. Dropping the handle
//! unregisters the subscriber, so a panel that goes away stops receiving
//! events without having to remember to unsubscribe.

mod subscriber;

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::eval::EvaluateResult;

pub use subscriber::{Subscriber, SubscriberId};

/// Event delivered after a pass completes.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationEvent<'a> {
    /// What the pass did.
    pub result: &'a EvaluateResult,
}

/// Each subscriber sits behind its own lock so delivery can run without
/// holding the registry lock.
type Registry = Mutex<IndexMap<SubscriberId, Arc<Mutex<Subscriber>>>>;

/// The set of subscribers owned by a graph.
#[derive(Debug, Default)]
pub struct Listeners {
    registry: Arc<Registry>,
}

impl Listeners {
    /// Create an empty listener set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and return the handle that keeps it alive.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: FnMut(&EvaluationEvent<'_>) + Send + 'static,
    {
        let subscriber = Subscriber::new(notify);
        let id = subscriber.id();
        self.registry
            .lock()
            .insert(id, Arc::new(Mutex::new(subscriber)));
        tracing::debug!(?id, "evaluation subscriber added");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// Callbacks run with the registry unlocked, so a subscriber may drop
    /// any [`Subscription`] (its own included) or subscribe new observers.
    /// A subscriber removed earlier in the same delivery is skipped; one
    /// added during delivery hears the next event.
    pub fn raise(&self, event: &EvaluationEvent<'_>) {
        let snapshot: Vec<(SubscriberId, Arc<Mutex<Subscriber>>)> = self
            .registry
            .lock()
            .iter()
            .map(|(id, subscriber)| (*id, Arc::clone(subscriber)))
            .collect();

        for (id, subscriber) in snapshot {
            if !self.registry.lock().contains_key(&id) {
                continue;
            }
            subscriber.lock().notify(event);
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// True if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to a registered subscriber.
///
/// Dropping this handle unregisters the subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<Registry>,
}

impl Subscription {
    /// The subscriber this handle refers to.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unregister now instead of at drop.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().shift_remove(&self.id);
            tracing::debug!(id = ?self.id, "evaluation subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(listeners: &Listeners) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let handle = listeners.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, handle)
    }

    #[test]
    fn raise_reaches_every_subscriber() {
        let listeners = Listeners::new();
        let (first, _h1) = counter(&listeners);
        let (second, _h2) = counter(&listeners);

        let result = EvaluateResult::default();
        listeners.raise(&EvaluationEvent { result: &result });
        listeners.raise(&EvaluationEvent { result: &result });

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_handle_unsubscribes() {
        let listeners = Listeners::new();
        let (count, handle) = counter(&listeners);
        assert_eq!(listeners.len(), 1);

        drop(handle);
        assert!(listeners.is_empty());

        let result = EvaluateResult::default();
        listeners.raise(&EvaluationEvent { result: &result });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn explicit_unsubscribe() {
        let listeners = Listeners::new();
        let (_count, handle) = counter(&listeners);
        handle.unsubscribe();
        assert!(listeners.is_empty());
    }

    #[test]
    fn subscriber_can_drop_its_own_handle() {
        let listeners = Listeners::new();
        let count = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let (count_clone, slot_clone) = (count.clone(), slot.clone());
        let handle = listeners.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            drop(slot_clone.lock().take());
        });
        *slot.lock() = Some(handle);

        let result = EvaluateResult::default();
        listeners.raise(&EvaluationEvent { result: &result });
        listeners.raise(&EvaluationEvent { result: &result });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn removal_during_delivery_skips_later_subscribers() {
        let listeners = Listeners::new();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let victim_clone = victim.clone();
        let _first = listeners.subscribe(move |_| {
            drop(victim_clone.lock().take());
        });
        let (count, handle) = counter(&listeners);
        *victim.lock() = Some(handle);

        let result = EvaluateResult::default();
        listeners.raise(&EvaluationEvent { result: &result });

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn handle_outliving_listeners_is_harmless() {
        let listeners = Listeners::new();
        let (_count, handle) = counter(&listeners);
        drop(listeners);
        drop(handle);
    }
}
