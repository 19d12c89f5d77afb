//! Subscriber types for evaluation notifications.
//!
//! A subscriber is any observer that wants to hear about completed passes,
//! such as an outliner or property panel that refreshes the nodes it shows.

use std::sync::atomic::{AtomicU64, Ordering};

use super::EvaluationEvent;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter so ids stay unique across graphs and threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// An observer of evaluation passes.
pub struct Subscriber {
    id: SubscriberId,
    notify: Box<dyn FnMut(&EvaluationEvent<'_>) + Send>,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: FnMut(&EvaluationEvent<'_>) + Send + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Box::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Deliver an event.
    pub fn notify(&mut self, event: &EvaluationEvent<'_>) {
        (self.notify)(event);
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvaluateResult;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn subscriber_notify_calls_callback() {
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let seen_clone = seen.clone();

        let mut subscriber = Subscriber::new(move |event| {
            seen_clone.store(event.result.node_count(), Ordering::SeqCst);
        });

        let result = EvaluateResult::default();
        subscriber.notify(&EvaluationEvent { result: &result });
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
