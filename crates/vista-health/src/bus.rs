//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! Subscription registry for breaker state transitions.
//!
//! Presentation code subscribes here to react to transitions without
//! polling; it also polls the aggregator on an interval. Both paths are
//! kept on purpose: polling gives a baseline refresh independent of
//! subscription wiring, push gives immediate responsiveness.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::warn;

use crate::capability::{CapabilityName, CapabilityState};

/// Which transitions a subscriber wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Transitions for a single capability.
    Capability(CapabilityName),
    /// Transitions for every capability.
    Any,
}

impl SubscriptionFilter {
    fn matches(&self, name: CapabilityName) -> bool {
        match self {
            SubscriptionFilter::Capability(wanted) => *wanted == name,
            SubscriptionFilter::Any => true,
        }
    }
}

/// Opaque handle returned by [`NotificationBus::subscribe`].
///
/// Unsubscribing through the token is the only removal path; nothing
/// expires silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type TransitionCallback = Arc<dyn Fn(CapabilityName, CapabilityState) + Send + Sync>;

struct SubscriptionEntry {
    filter: SubscriptionFilter,
    callback: TransitionCallback,
}

/// Registry of transition subscribers keyed by token.
pub struct NotificationBus {
    next_token: AtomicU64,
    subscribers: RwLock<IndexMap<u64, SubscriptionEntry>>,
}

impl NotificationBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            subscribers: RwLock::new(IndexMap::new()),
        }
    }

    /// Register a callback for matching transitions.
    pub fn subscribe<F>(&self, filter: SubscriptionFilter, callback: F) -> SubscriptionToken
    where
        F: Fn(CapabilityName, CapabilityState) + Send + Sync + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(
            token,
            SubscriptionEntry {
                filter,
                callback: Arc::new(callback),
            },
        );
        SubscriptionToken(token)
    }

    /// Remove a subscription. Returns false if the token was already gone.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.write().shift_remove(&token.0).is_some()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver a transition to every matching subscriber.
    ///
    /// Callbacks run on the publishing caller's thread after all record
    /// locks are released; a panicking subscriber is isolated and logged,
    /// never propagated into the breaker.
    pub fn publish(&self, name: CapabilityName, state: CapabilityState) {
        let matching: Vec<TransitionCallback> = {
            let subscribers = self.subscribers.read();
            subscribers
                .values()
                .filter(|entry| entry.filter.matches(name))
                .map(|entry| entry.callback.clone())
                .collect()
        };
        for callback in matching {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(name, state)));
            if outcome.is_err() {
                warn!(
                    target: "vista::health::bus",
                    capability = %name,
                    state = %state,
                    "transition subscriber panicked; continuing",
                );
            }
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn capability_filter_receives_only_its_transitions() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(
            SubscriptionFilter::Capability(CapabilityName::VectorSearch),
            move |name, state| sink.lock().unwrap().push((name, state)),
        );

        bus.publish(CapabilityName::VectorSearch, CapabilityState::Open);
        bus.publish(CapabilityName::VisionDetection, CapabilityState::Open);

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[(CapabilityName::VectorSearch, CapabilityState::Open)]
        );
    }

    #[test]
    fn wildcard_receives_everything() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(SubscriptionFilter::Any, move |name, _| {
            sink.lock().unwrap().push(name)
        });

        bus.publish(CapabilityName::EnhancedAnalysis, CapabilityState::Open);
        bus.publish(CapabilityName::ReferenceDataset, CapabilityState::HalfOpen);

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(0u32));
        let sink = seen.clone();
        let token = bus.subscribe(SubscriptionFilter::Any, move |_, _| {
            *sink.lock().unwrap() += 1
        });

        bus.publish(CapabilityName::VectorSearch, CapabilityState::Open);
        assert!(bus.unsubscribe(token));
        bus.publish(CapabilityName::VectorSearch, CapabilityState::Closed);

        assert_eq!(*seen.lock().unwrap(), 1);
        assert!(!bus.unsubscribe(token));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn panicking_subscriber_does_not_break_delivery() {
        let bus = NotificationBus::new();
        bus.subscribe(SubscriptionFilter::Any, |_, _| panic!("bad subscriber"));
        let seen = Arc::new(Mutex::new(0u32));
        let sink = seen.clone();
        bus.subscribe(SubscriptionFilter::Any, move |_, _| {
            *sink.lock().unwrap() += 1
        });

        bus.publish(CapabilityName::VisionDetection, CapabilityState::Open);
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
