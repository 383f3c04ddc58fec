//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! Per-capability circuit breaking over the shared capability records.
//!
//! Each record sits behind its own lock so capabilities degrade and
//! recover fully in parallel; there is no global lock. Transitions are
//! published to the notification bus and metrics only after the record
//! lock has been released.

use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use vista_common::config::HealthConfig;
use vista_common::time::monotonic_now;

use crate::bus::NotificationBus;
use crate::capability::{
    Admission, CapabilityName, CapabilityRecord, CapabilitySnapshot, CapabilityState,
};
use crate::metrics::HealthMetrics;
use std::sync::Arc;

/// Supervises the breaker state machine for every capability.
pub struct ServiceBreaker {
    records: IndexMap<CapabilityName, Mutex<CapabilityRecord>>,
    bus: Arc<NotificationBus>,
    metrics: Option<HealthMetrics>,
}

impl ServiceBreaker {
    /// Build one record per capability from the effective configuration.
    pub fn new(
        config: &HealthConfig,
        bus: Arc<NotificationBus>,
        metrics: Option<HealthMetrics>,
    ) -> Self {
        let mut records = IndexMap::new();
        for name in CapabilityName::ALL {
            let policy = config.policy_for(name.as_str());
            records.insert(name, Mutex::new(CapabilityRecord::new(name, policy)));
        }
        Self {
            records,
            bus,
            metrics,
        }
    }

    fn record(&self, name: CapabilityName) -> &Mutex<CapabilityRecord> {
        self.records
            .get(&name)
            .expect("every capability is registered at construction")
    }

    /// Admission decision for one attempt against `name`.
    ///
    /// Denied only while the breaker is open and cooling down, or while
    /// another caller holds the half-open probe slot. May perform the
    /// lazy open-to-half-open transition as a side effect; a
    /// [`Admission::Probe`] result means the caller now occupies the
    /// probe slot and must resolve it through `record_success`,
    /// `record_failure`, or `abandon_probe`.
    pub fn admit(&self, name: CapabilityName) -> Admission {
        let (admission, transition) = {
            let mut record = self.record(name).lock();
            record.may_attempt(monotonic_now())
        };
        if let Some(state) = transition {
            info!(
                target: "vista::health::breaker",
                capability = %name,
                "cooldown elapsed; probing capability",
            );
            self.publish(name, state);
        }
        if !admission.is_allowed() {
            debug!(
                target: "vista::health::breaker",
                capability = %name,
                "call short-circuited",
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_short_circuit(name.as_str());
            }
        }
        admission
    }

    /// Whether a call against `name` may proceed right now.
    pub fn may_attempt(&self, name: CapabilityName) -> bool {
        self.admit(name).is_allowed()
    }

    /// Record a successful invocation against `name`.
    pub fn record_success(&self, name: CapabilityName) {
        let transition = self.apply(name, |record, now| record.record_success(now));
        if let Some(state) = transition {
            info!(
                target: "vista::health::breaker",
                capability = %name,
                "capability recovered; breaker closed",
            );
            self.publish(name, state);
        }
    }

    /// Record a failed invocation against `name`.
    pub fn record_failure(&self, name: CapabilityName) {
        let transition = self.apply(name, |record, now| record.record_failure(now));
        if let Some(state) = transition {
            warn!(
                target: "vista::health::breaker",
                capability = %name,
                state = %state,
                "capability tripped open",
            );
            self.publish(name, state);
        }
    }

    /// Release a probe slot whose attempt was cancelled mid-flight.
    pub fn abandon_probe(&self, name: CapabilityName) {
        self.record(name).lock().abandon_probe();
    }

    /// Force one capability back to closed (operator recovery path).
    pub fn reset(&self, name: CapabilityName) {
        let transition = {
            let mut record = self.record(name).lock();
            record.reset()
        };
        if let Some(state) = transition {
            info!(
                target: "vista::health::breaker",
                capability = %name,
                "breaker reset by operator",
            );
            self.publish(name, state);
        }
    }

    /// Force every capability back to closed.
    pub fn reset_all(&self) {
        for name in self.records.keys().copied().collect::<Vec<_>>() {
            self.reset(name);
        }
    }

    /// Snapshot one capability record.
    pub fn snapshot(&self, name: CapabilityName) -> CapabilitySnapshot {
        self.record(name).lock().snapshot(monotonic_now())
    }

    /// Snapshot every capability record.
    pub fn snapshots(&self) -> Vec<CapabilitySnapshot> {
        let now = monotonic_now();
        self.records
            .values()
            .map(|record| record.lock().snapshot(now))
            .collect()
    }

    /// Current state of every capability, for the aggregator.
    pub fn states(&self) -> Vec<(CapabilityName, CapabilityState)> {
        self.records
            .iter()
            .map(|(name, record)| (*name, record.lock().state()))
            .collect()
    }

    fn apply<F>(&self, name: CapabilityName, op: F) -> Option<CapabilityState>
    where
        F: FnOnce(&mut CapabilityRecord, Instant) -> Option<CapabilityState>,
    {
        let mut record = self.record(name).lock();
        op(&mut record, monotonic_now())
    }

    fn publish(&self, name: CapabilityName, state: CapabilityState) {
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(name.as_str(), state.as_str());
        }
        self.bus.publish(name, state);
    }
}

impl std::fmt::Debug for ServiceBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBreaker")
            .field("capabilities", &self.records.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vista_common::config::CapabilityPolicy;

    fn test_config(cooldown_ms: u64) -> HealthConfig {
        HealthConfig {
            default_policy: CapabilityPolicy {
                failure_threshold: 3,
                cooldown: Duration::from_millis(cooldown_ms),
                successes_to_close: 2,
            },
            ..HealthConfig::default()
        }
    }

    fn breaker(cooldown_ms: u64) -> ServiceBreaker {
        ServiceBreaker::new(
            &test_config(cooldown_ms),
            Arc::new(NotificationBus::new()),
            None,
        )
    }

    #[test]
    fn independent_capabilities_trip_independently() {
        let breaker = breaker(50);
        for _ in 0..3 {
            breaker.record_failure(CapabilityName::VectorSearch);
        }
        assert!(!breaker.may_attempt(CapabilityName::VectorSearch));
        assert!(breaker.may_attempt(CapabilityName::VisionDetection));
        assert!(breaker.may_attempt(CapabilityName::EnhancedAnalysis));
    }

    #[test]
    fn concurrent_callers_race_for_a_single_probe() {
        let breaker = Arc::new(breaker(10));
        for _ in 0..3 {
            breaker.record_failure(CapabilityName::ReferenceDataset);
        }
        std::thread::sleep(Duration::from_millis(20));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let breaker = breaker.clone();
            handles.push(std::thread::spawn(move || {
                breaker.may_attempt(CapabilityName::ReferenceDataset)
            }));
        }
        let admitted = handles
            .into_iter()
            .map(|h| h.join().expect("probe thread panicked"))
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 1, "exactly one caller may win the probe slot");
    }

    #[test]
    fn reset_all_closes_every_capability() {
        let breaker = breaker(60_000);
        for name in CapabilityName::ALL {
            for _ in 0..3 {
                breaker.record_failure(name);
            }
        }
        for (_, state) in breaker.states() {
            assert_eq!(state, CapabilityState::Open);
        }
        breaker.reset_all();
        for snapshot in breaker.snapshots() {
            assert_eq!(snapshot.state, CapabilityState::Closed);
            assert_eq!(snapshot.consecutive_failures, 0);
            assert_eq!(snapshot.consecutive_successes, 0);
        }
    }
}
