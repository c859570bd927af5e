use slotmap::{SlotMap, new_key_type};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::occupancy::events::{EventKind, RailEvent};

new_key_type! {
    struct SubscriptionKey;
}

pub type EventHandler = Arc<dyn Fn(&RailEvent) -> anyhow::Result<()> + Send + Sync>;

/// Owned handle returned by `subscribe`, consumed by `unsubscribe`.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping the handle makes the subscription impossible to remove"]
pub struct Subscription {
    key: SubscriptionKey,
}

struct Subscriber {
    /// `None` receives every event kind.
    filter: Option<EventKind>,
    handler: EventHandler,
}

#[derive(Default)]
struct BusInner {
    subscribers: SlotMap<SubscriptionKey, Subscriber>,
    /// Registration order, used as delivery order.
    order: Vec<SubscriptionKey>,
}

/// Synchronous typed publish/subscribe bus.
///
/// `publish` delivers to every matching subscriber, in registration order, before it
/// returns. A subscriber returning an error or panicking is logged and skipped, the
/// remaining subscribers still receive the event.
#[derive(Default)]
pub struct EventBus {
    inner: RwLock<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("subscribers", &self.subscriber_count()).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&RailEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler))
    }

    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RailEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    fn register(&self, filter: Option<EventKind>, handler: EventHandler) -> Subscription {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let key = guard.subscribers.insert(Subscriber { filter, handler });
        guard.order.push(key);

        Subscription { key }
    }

    /// # Returns
    /// Returns `true` if the subscription was still registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.order.retain(|key| *key != subscription.key);
        guard.subscribers.remove(subscription.key).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).subscribers.len()
    }

    /// Delivers `event` to all matching subscribers. `None` is a no-op.
    ///
    /// # Returns
    /// Returns the number of subscribers that handled the event without failing.
    pub fn publish(&self, event: impl Into<Option<RailEvent>>) -> usize {
        let Some(event) = event.into() else {
            return 0;
        };

        let kind = event.kind();

        // Handlers run without the lock held, so they may (un)subscribe or publish themselves.
        let handlers: Vec<EventHandler> = {
            let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            guard
                .order
                .iter()
                .filter_map(|key| guard.subscribers.get(*key))
                .filter(|subscriber| subscriber.filter.is_none_or(|filter| filter == kind))
                .map(|subscriber| subscriber.handler.clone())
                .collect()
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => log::error!("EventSubscriberFailed: Subscriber for {:?} returned an error: {:#}", kind, e),
                Err(_) => log::error!("EventSubscriberFailed: Subscriber for {:?} panicked.", kind),
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::utils::id::WorldId;
    use std::sync::Mutex;

    fn reloaded() -> RailEvent {
        RailEvent::GraphReloaded { world_id: WorldId::nil() }
    }

    #[test]
    fn typed_and_global_subscribers_receive_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = seen.clone();
        let _a = bus.subscribe(EventKind::GraphReloaded, move |_| {
            s1.lock().unwrap().push("typed");
            Ok(())
        });
        let s2 = seen.clone();
        let _b = bus.subscribe_all(move |_| {
            s2.lock().unwrap().push("global");
            Ok(())
        });
        let s3 = seen.clone();
        let _c = bus.subscribe(EventKind::GraphStale, move |_| {
            s3.lock().unwrap().push("other");
            Ok(())
        });

        assert_eq!(bus.publish(reloaded()), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["typed", "global"]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let _err = bus.subscribe_all(|_| Err(anyhow::anyhow!("boom")));
        let _panic = bus.subscribe_all(|_| panic!("subscriber bug"));
        let c = count.clone();
        let _ok = bus.subscribe_all(move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(bus.publish(reloaded()), 1);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn unsubscribe_and_none_publish() {
        let bus = EventBus::new();
        let sub = bus.subscribe_all(|_| Ok(()));

        assert_eq!(bus.publish(None::<RailEvent>), 0);
        assert!(bus.unsubscribe(sub));
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(reloaded()), 0);
    }
}
