//! Storage change fan-out.
//!
//! # Responsibility
//! - Track every connected observer and the namespaces it watches.
//! - Deliver each change event to all observers of its namespace.
//!
//! # Invariants
//! - One `notify` call is one event; delivery count equals the number of
//!   subscribers watching the namespace at that moment.
//! - Observers are delivered to in subscription order.

use crate::model::message::{ChangeEvent, MessageSink, OutboundMessage};
use crate::model::namespace::Namespace;
use log::debug;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Stable handle returned by [`ChangeNotifier::subscribe`].
pub type SubscriptionId = Uuid;

struct Subscription {
    id: SubscriptionId,
    namespaces: BTreeSet<Namespace>,
    sink: Arc<dyn MessageSink>,
}

/// Publish/subscribe registry keyed by namespace.
#[derive(Default)]
pub struct ChangeNotifier {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sink` for change events of the listed namespaces.
    pub fn subscribe(
        &self,
        namespaces: &[Namespace],
        sink: Arc<dyn MessageSink>,
    ) -> SubscriptionId {
        let id = Uuid::new_v4();
        let namespaces = namespaces.iter().copied().collect::<BTreeSet<_>>();
        debug!(
            "event=subscribe module=notify status=ok subscription={} namespaces={}",
            id,
            namespaces.len()
        );
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                id,
                namespaces,
                sink,
            });
        id
    }

    /// Removes one subscription; returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        let removed = subscriptions.len() != before;
        debug!(
            "event=unsubscribe module=notify status={} subscription={}",
            if removed { "ok" } else { "not_found" },
            id
        );
        removed
    }

    /// Number of subscribers currently watching `namespace`.
    pub fn subscriber_count(&self, namespace: Namespace) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|subscription| subscription.namespaces.contains(&namespace))
            .count()
    }

    /// Delivers `event` as `storage-change` to every subscriber of its
    /// namespace and returns the number of deliveries.
    pub fn notify(&self, event: &ChangeEvent) -> usize {
        let subscriptions = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for subscription in subscriptions
            .iter()
            .filter(|subscription| subscription.namespaces.contains(&event.namespace))
        {
            subscription
                .sink
                .dispatch(OutboundMessage::StorageChange(event.clone()));
            delivered += 1;
        }
        debug!(
            "event=storage_change module=notify status=ok namespace={} old_keys={} delivered={}",
            event.namespace,
            event.old.len(),
            delivered
        );
        delivered
    }
}
