//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! The health manager facade.
//!
//! Constructed once at application start and injected into call sites;
//! tests construct a fresh instance each. There is deliberately no
//! implicit global.

use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vista_common::config::{HealthConfig, HealthPolicy};

use crate::breaker::ServiceBreaker;
use crate::bus::{NotificationBus, SubscriptionFilter, SubscriptionToken};
use crate::capability::{CapabilityName, CapabilitySnapshot, CapabilityState};
use crate::fallback::{FallbackChain, FallbackOutcome, FallbackTier, TierFailure};
use crate::health::{self, SystemHealthSnapshot};
use crate::metrics::HealthMetrics;
use crate::retry::RetryPolicy;
use crate::{HealthError, Result};

/// Supervisory facade over breaker, retry, fallback, aggregation, and
/// notification for every storefront backend capability.
pub struct HealthManager {
    breaker: ServiceBreaker,
    bus: Arc<NotificationBus>,
    health_policy: HealthPolicy,
    metrics: Option<HealthMetrics>,
}

impl HealthManager {
    /// Build a manager from configuration, without metrics.
    pub fn new(config: HealthConfig) -> Self {
        Self::with_metrics(config, None)
    }

    /// Build a manager wired to a metrics handle.
    pub fn with_metrics(config: HealthConfig, metrics: Option<HealthMetrics>) -> Self {
        let bus = Arc::new(NotificationBus::new());
        let breaker = ServiceBreaker::new(&config, bus.clone(), metrics.clone());
        Self {
            breaker,
            bus,
            health_policy: config.aggregation,
            metrics,
        }
    }

    /// Whether a call against `capability` may proceed right now.
    pub fn may_attempt(&self, capability: CapabilityName) -> bool {
        self.breaker.may_attempt(capability)
    }

    /// Record a successful invocation observed outside the executors.
    pub fn record_success(&self, capability: CapabilityName) {
        self.breaker.record_success(capability);
    }

    /// Record a failed invocation observed outside the executors.
    pub fn record_failure(&self, capability: CapabilityName) {
        self.breaker.record_failure(capability);
    }

    /// Run one capability invocation with bounded retry and backoff.
    ///
    /// The breaker is consulted before every attempt; a short-circuited
    /// call fails with [`HealthError::CapabilityUnavailable`] without
    /// invoking anything or touching counters. Cancellation aborts the
    /// in-flight invocation or backoff sleep and records nothing for the
    /// aborted attempt.
    pub async fn run_with_retry<T, F, Fut>(
        &self,
        capability: CapabilityName,
        mut operation: F,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut last_error = None;
        for attempt in 1..=policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(HealthError::Cancelled);
            }
            let admission = self.breaker.admit(capability);
            if !admission.is_allowed() {
                return Err(HealthError::CapabilityUnavailable { capability });
            }

            let outcome = tokio::select! {
                () = cancel.cancelled() => {
                    // Only a cancelled probe releases the slot; a cancelled
                    // ordinary attempt must not free a probe another caller
                    // holds. Cancellation is never attributed to the
                    // dependency either way.
                    if admission.holds_probe() {
                        self.breaker.abandon_probe(capability);
                    }
                    return Err(HealthError::Cancelled);
                }
                outcome = operation(attempt) => outcome,
            };

            match outcome {
                Ok(value) => {
                    self.breaker.record_success(capability);
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_retry_attempt(capability.as_str(), "success");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    self.breaker.record_failure(capability);
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_retry_attempt(capability.as_str(), "failure");
                    }
                    debug!(
                        target: "vista::health::retry",
                        capability = %capability,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "invocation attempt failed",
                    );
                    last_error = Some(err);
                    if attempt < policy.max_attempts {
                        let delay = policy.backoff_delay(attempt);
                        tokio::select! {
                            () = cancel.cancelled() => return Err(HealthError::Cancelled),
                            () = sleep(delay) => {}
                        }
                    }
                }
            }
        }

        let source = last_error.expect("at least one attempt ran");
        warn!(
            target: "vista::health::retry",
            capability = %capability,
            attempts = policy.max_attempts,
            "retry budget exhausted",
        );
        Err(HealthError::RetriesExhausted {
            capability,
            attempts: policy.max_attempts,
            source,
        })
    }

    /// Walk a fallback chain tier by tier until one succeeds.
    ///
    /// Unavailable or exhausted tiers are skipped without extra delay:
    /// the retry executor already paid the backoff cost for that tier.
    /// Cancellation is re-raised unmodified at any point.
    pub async fn run_with_fallback<T>(
        &self,
        chain: FallbackChain<T>,
        cancel: &CancellationToken,
    ) -> Result<FallbackOutcome<T>> {
        let mut failures = Vec::new();
        for (tier_index, tier) in chain.tiers.into_iter().enumerate() {
            let FallbackTier {
                capability,
                retry,
                invoke,
            } = tier;
            match self
                .run_with_retry(capability, |_attempt| invoke(), &retry, cancel)
                .await
            {
                Ok(value) => {
                    if tier_index > 0 {
                        info!(
                            target: "vista::health::fallback",
                            tier = %capability,
                            tier_index,
                            "operation satisfied by a degraded tier",
                        );
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.record_fallback(capability.as_str(), "success");
                    }
                    return Ok(FallbackOutcome {
                        value,
                        tier: capability,
                        tier_index,
                    });
                }
                Err(HealthError::Cancelled) => return Err(HealthError::Cancelled),
                Err(
                    error @ (HealthError::CapabilityUnavailable { .. }
                    | HealthError::RetriesExhausted { .. }),
                ) => {
                    debug!(
                        target: "vista::health::fallback",
                        tier = %capability,
                        tier_index,
                        error = %error,
                        "tier failed; trying next",
                    );
                    failures.push(TierFailure { capability, error });
                }
                Err(other) => return Err(other),
            }
        }

        warn!(
            target: "vista::health::fallback",
            tiers = failures.len(),
            "every fallback tier exhausted",
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_fallback("none", "exhausted");
        }
        Err(HealthError::AllTiersExhausted { failures })
    }

    /// Recompute the system-wide health snapshot from the live records.
    pub fn system_health(&self) -> SystemHealthSnapshot {
        health::aggregate(&self.health_policy, &self.breaker.states())
    }

    /// Snapshot one capability record.
    pub fn capability_snapshot(&self, capability: CapabilityName) -> CapabilitySnapshot {
        self.breaker.snapshot(capability)
    }

    /// Snapshot every capability record.
    pub fn snapshots(&self) -> Vec<CapabilitySnapshot> {
        self.breaker.snapshots()
    }

    /// Subscribe to breaker transitions; see [`NotificationBus::subscribe`].
    pub fn subscribe<F>(&self, filter: SubscriptionFilter, callback: F) -> SubscriptionToken
    where
        F: Fn(CapabilityName, CapabilityState) + Send + Sync + 'static,
    {
        self.bus.subscribe(filter, callback)
    }

    /// Remove a transition subscription.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.bus.unsubscribe(token)
    }

    /// Force one capability back to closed.
    pub fn reset(&self, capability: CapabilityName) {
        self.breaker.reset(capability);
    }

    /// Force every capability back to closed; backs the operator-facing
    /// "retry" action.
    pub fn reset_all(&self) {
        self.breaker.reset_all();
    }
}

impl std::fmt::Debug for HealthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthManager")
            .field("breaker", &self.breaker)
            .field("subscribers", &self.bus.subscriber_count())
            .finish_non_exhaustive()
    }
}
