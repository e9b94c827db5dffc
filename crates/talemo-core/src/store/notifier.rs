//! Synchronous publish/subscribe used by the store and the accounts adapter.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

/// Fan-out of events of type `E` to registered handlers.
///
/// `notify` snapshots the handler list and releases the lock before invoking
/// anything, so handlers may subscribe, unsubscribe or trigger further
/// notifications from inside a callback. A handler removed mid-round still
/// sees the round it was snapshotted into.
pub struct Notifier<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> Notifier<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, handler: Handler<E>) -> Subscription {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.push((id, handler));
            id
        };

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.lock().handlers.retain(|(hid, _)| *hid != id);
            }
        })
    }

    pub fn notify(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self
            .registry
            .lock()
            .handlers
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.registry.lock().handlers.len()
    }
}

impl<E: 'static> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a handler registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Explicit form of dropping the guard.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_every_handler() {
        let notifier: Notifier<u32> = Notifier::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = Arc::clone(&total);
        let _a = notifier.subscribe(Arc::new(move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        }));
        let t2 = Arc::clone(&total);
        let _b = notifier.subscribe(Arc::new(move |v| {
            t2.fetch_add(*v as usize, Ordering::SeqCst);
        }));

        notifier.notify(&3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier: Notifier<()> = Notifier::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let sub = notifier.subscribe(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        notifier.notify(&());
        drop(sub);
        notifier.notify(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_handler_may_subscribe_reentrantly() {
        let notifier: Arc<Notifier<()>> = Arc::new(Notifier::new());
        let held: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let n = Arc::clone(&notifier);
        let h = Arc::clone(&held);
        let _sub = notifier.subscribe(Arc::new(move |_| {
            // Would deadlock if notify held the registry lock.
            let inner = n.subscribe(Arc::new(|_| {}));
            h.lock().push(inner);
        }));

        notifier.notify(&());
        assert_eq!(notifier.subscriber_count(), 2);
    }

    #[test]
    fn test_subscription_outliving_notifier() {
        let notifier: Notifier<()> = Notifier::new();
        let sub = notifier.subscribe(Arc::new(|_| {}));
        drop(notifier);
        sub.unsubscribe();
    }
}
