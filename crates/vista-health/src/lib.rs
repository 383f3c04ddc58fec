//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! Service health and degradation manager for the VISTA storefront.
//!
//! The storefront depends on several independently-failing backend
//! capabilities (enhanced analysis, vector search, reference dataset,
//! vision detection). This crate supervises their live health: a
//! per-capability circuit breaker decides whether each capability is safe
//! to invoke, a retry executor drives bounded backoff, and a fallback
//! orchestrator walks prioritised capability chains so requests complete
//! in degraded form when backends are failing. Presentation code reacts
//! through the notification bus or by polling the health aggregator.
#![warn(missing_docs)]

pub mod breaker;
pub mod bus;
pub mod capability;
pub mod fallback;
pub mod health;
pub mod manager;
pub mod metrics;
pub mod retry;

/// Shared result type for health-manager operations.
pub type Result<T> = std::result::Result<T, HealthError>;

/// Error taxonomy for capability invocations driven through the manager.
///
/// Underlying backend errors are opaque: the manager observes only
/// success or failure, never error content.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// The breaker is open and still cooling down; no invocation occurred.
    #[error("capability '{capability}' unavailable: breaker open and cooling down")]
    CapabilityUnavailable {
        /// Capability whose breaker short-circuited the call.
        capability: capability::CapabilityName,
    },
    /// Every configured attempt against one capability failed.
    #[error("capability '{capability}' failed after {attempts} attempts")]
    RetriesExhausted {
        /// Capability that exhausted its retry budget.
        capability: capability::CapabilityName,
        /// Number of attempts that were made.
        attempts: u32,
        /// Last underlying invocation error.
        #[source]
        source: anyhow::Error,
    },
    /// Every tier in a fallback chain failed; terminal for the operation.
    #[error("all fallback tiers exhausted")]
    AllTiersExhausted {
        /// Per-tier failures, in chain order, for diagnostics.
        failures: Vec<fallback::TierFailure>,
    },
    /// The caller's cancellation signal fired; nothing was recorded
    /// against any capability for the aborted attempt.
    #[error("operation cancelled")]
    Cancelled,
}

impl HealthError {
    /// Whether this error is the caller's own cancellation, re-raised.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HealthError::Cancelled)
    }
}

pub use breaker::ServiceBreaker;
pub use bus::{NotificationBus, SubscriptionFilter, SubscriptionToken};
pub use capability::{
    Admission, CapabilityName, CapabilityRecord, CapabilitySnapshot, CapabilityState,
};
pub use fallback::{FallbackChain, FallbackOutcome, TierFailure};
pub use health::{OverallHealth, SystemHealthSnapshot};
pub use manager::HealthManager;
pub use metrics::HealthMetrics;
pub use retry::RetryPolicy;

/// Crate prelude collecting the most commonly used types.
pub mod prelude {
    pub use super::capability::{CapabilityName, CapabilitySnapshot, CapabilityState};
    pub use super::fallback::{FallbackChain, FallbackOutcome};
    pub use super::health::{OverallHealth, SystemHealthSnapshot};
    pub use super::manager::HealthManager;
    pub use super::retry::RetryPolicy;
    pub use super::{HealthError, Result};
}
