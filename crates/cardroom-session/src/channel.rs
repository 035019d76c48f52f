//! Multicast channels with explicit subscriptions.
//!
//! A [`Channel`] is a named delivery point for one kind of value. Every
//! value published is handed, in order, to every handler subscribed *at
//! that moment*. Nothing is buffered: a handler subscribed after a value
//! was published never sees it.
//!
//! Delivery is synchronous. `publish` returns only after each live handler
//! has run, which is what gives the session its one-event-at-a-time
//! behaviour.
//!
//! # Re-entrancy
//!
//! Handlers are allowed to unsubscribe anything (including themselves, or
//! the whole session) while a publish is in flight. `publish` works on a
//! snapshot of the subscriber list taken under the lock, and re-checks
//! each entry's `active` flag right before calling it, so a handler that
//! was unsubscribed earlier in the same publish is skipped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    active: AtomicBool,
    handler: Handler<T>,
}

struct Shared<T> {
    name: &'static str,
    next_id: AtomicU64,
    closed: AtomicBool,
    entries: Mutex<Vec<Arc<Entry<T>>>>,
}

impl<T> Shared<T> {
    fn entries(&self) -> MutexGuard<'_, Vec<Arc<Entry<T>>>> {
        // A panicking handler never runs under this lock, so a poisoned
        // guard still holds a consistent list.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) {
        self.entries().retain(|e| e.id != id);
    }
}

/// A named, ordered, multicast delivery point for values of type `T`.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T: 'static> Channel<T> {
    /// Creates an empty channel. `name` shows up in traces.
    pub fn new(name: &'static str) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Registers a handler for every value published from now on.
    ///
    /// The returned [`Subscription`] keeps the handler registered until it
    /// is unsubscribed or dropped. Subscribing to a closed channel returns
    /// a subscription that never fires.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if self.shared.closed.load(Ordering::Acquire) {
            tracing::debug!(channel = self.shared.name, "subscribe on closed channel");
            return Subscription::inert();
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Entry {
            id,
            active: AtomicBool::new(true),
            handler: Arc::new(handler),
        });
        self.shared.entries().push(Arc::clone(&entry));

        let shared: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            entry.active.store(false, Ordering::Release);
            if let Some(shared) = shared.upgrade() {
                shared.remove(entry.id);
            }
        })
    }

    /// Delivers `value` to every current subscriber, in subscription order.
    ///
    /// Returns the number of handlers that actually ran.
    pub fn publish(&self, value: &T) -> usize {
        if self.shared.closed.load(Ordering::Acquire) {
            return 0;
        }

        let snapshot: Vec<Arc<Entry<T>>> = self.shared.entries().clone();
        let mut delivered = 0;
        for entry in snapshot {
            if !entry.active.load(Ordering::Acquire)
                || self.shared.closed.load(Ordering::Acquire)
            {
                continue;
            }
            (entry.handler)(value);
            delivered += 1;
        }

        tracing::trace!(channel = self.shared.name, delivered, "event delivered");
        delivered
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.entries().len()
    }

    /// Drops every subscriber and refuses new ones. Idempotent.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries = std::mem::take(&mut *self.shared.entries());
        for entry in &entries {
            entry.active.store(false, Ordering::Release);
        }
        tracing::trace!(
            channel = self.shared.name,
            dropped = entries.len(),
            "channel closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live registration on a [`Channel`].
///
/// Unsubscribing is idempotent, and dropping the subscription unsubscribes
/// too, so a subscription can never outlive its owner by accident.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    fn inert() -> Self {
        Self { cancel: None }
    }

    /// Stops further deliveries to this subscription's handler.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A bag of subscriptions released together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Unsubscribes everything in the set and empties it.
    ///
    /// Returns how many subscriptions were released.
    pub fn unsubscribe_all(&mut self) -> usize {
        let released = self.subscriptions.len();
        for mut subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        released
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}
