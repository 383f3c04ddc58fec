//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
use anyhow::Result;
use prometheus::{IntCounterVec, Opts};
use vista_metrics::SharedRegistry;

/// Metrics published by the health manager.
#[derive(Clone)]
pub struct HealthMetrics {
    registry: SharedRegistry,
    transitions_total: IntCounterVec,
    short_circuits_total: IntCounterVec,
    retry_attempts_total: IntCounterVec,
    fallback_results_total: IntCounterVec,
}

impl HealthMetrics {
    /// Register the health metric families against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let transitions_total = IntCounterVec::new(
            Opts::new(
                "vista_health_transitions_total",
                "Breaker state transitions by capability and resulting state",
            ),
            &["capability", "state"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let short_circuits_total = IntCounterVec::new(
            Opts::new(
                "vista_health_short_circuits_total",
                "Calls rejected without invocation because the breaker was open",
            ),
            &["capability"],
        )?;
        registry.register(Box::new(short_circuits_total.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new(
                "vista_health_retry_attempts_total",
                "Invocation attempts driven by the retry executor, by outcome",
            ),
            &["capability", "outcome"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let fallback_results_total = IntCounterVec::new(
            Opts::new(
                "vista_health_fallback_results_total",
                "Fallback chain walks by winning tier, or 'none' when exhausted",
            ),
            &["tier", "outcome"],
        )?;
        registry.register(Box::new(fallback_results_total.clone()))?;

        Ok(Self {
            registry,
            transitions_total,
            short_circuits_total,
            retry_attempts_total,
            fallback_results_total,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Count a breaker transition into `state`.
    pub fn record_transition(&self, capability: &str, state: &str) {
        self.transitions_total
            .with_label_values(&[capability, state])
            .inc();
    }

    /// Count a short-circuited call.
    pub fn inc_short_circuit(&self, capability: &str) {
        self.short_circuits_total
            .with_label_values(&[capability])
            .inc();
    }

    /// Count one invocation attempt and its outcome.
    pub fn inc_retry_attempt(&self, capability: &str, outcome: &str) {
        self.retry_attempts_total
            .with_label_values(&[capability, outcome])
            .inc();
    }

    /// Count the result of a full fallback chain walk.
    pub fn record_fallback(&self, tier: &str, outcome: &str) {
        self.fallback_results_total
            .with_label_values(&[tier, outcome])
            .inc();
    }
}

impl std::fmt::Debug for HealthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMetrics").finish_non_exhaustive()
    }
}
