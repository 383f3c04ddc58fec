//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! Prioritised fallback chains for one logical operation.
//!
//! A chain is constructed per call site, never persisted. The walk over
//! the tiers lives on [`crate::manager::HealthManager`].

use std::fmt;

use futures::future::BoxFuture;

use crate::capability::CapabilityName;
use crate::retry::RetryPolicy;
use crate::HealthError;

pub(crate) type TierInvocation<T> =
    Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// One tier of a fallback chain: a capability plus its invocation.
pub struct FallbackTier<T> {
    pub(crate) capability: CapabilityName,
    pub(crate) retry: RetryPolicy,
    pub(crate) invoke: TierInvocation<T>,
}

/// Ordered, caller-supplied capability tiers for one logical operation.
///
/// Tiers are attempted in insertion order; the first success wins and no
/// later tier's invocation runs.
pub struct FallbackChain<T> {
    pub(crate) tiers: Vec<FallbackTier<T>>,
}

impl<T> FallbackChain<T> {
    /// Start an empty chain.
    pub fn new() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Append a tier using the default retry policy.
    pub fn tier<F, Fut>(self, capability: CapabilityName, invoke: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.tier_with_policy(capability, RetryPolicy::default(), invoke)
    }

    /// Append a tier with an explicit retry policy.
    pub fn tier_with_policy<F, Fut>(
        mut self,
        capability: CapabilityName,
        retry: RetryPolicy,
        invoke: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.tiers.push(FallbackTier {
            capability,
            retry,
            invoke: Box::new(move || Box::pin(invoke())),
        });
        self
    }

    /// Number of tiers in the chain.
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Whether the chain has no tiers.
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl<T> Default for FallbackChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FallbackChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field(
                "tiers",
                &self
                    .tiers
                    .iter()
                    .map(|tier| tier.capability)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A successful fallback result, tagged with the tier that produced it.
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    /// Value produced by the winning tier.
    pub value: T,
    /// Capability that satisfied the operation.
    pub tier: CapabilityName,
    /// Zero-based position of the winning tier in the chain.
    pub tier_index: usize,
}

impl<T> FallbackOutcome<T> {
    /// Whether the result came from anything but the preferred tier.
    ///
    /// Callers use this to show a non-blocking degradation notice.
    pub fn degraded(&self) -> bool {
        self.tier_index > 0
    }
}

/// Failure of a single tier, kept for diagnostics in
/// [`HealthError::AllTiersExhausted`].
#[derive(Debug)]
pub struct TierFailure {
    /// Capability whose tier failed.
    pub capability: CapabilityName,
    /// Error the tier failed with.
    pub error: HealthError,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.capability, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_preserves_tier_order() {
        let chain: FallbackChain<u32> = FallbackChain::new()
            .tier(CapabilityName::EnhancedAnalysis, || async { Ok(1) })
            .tier(CapabilityName::ReferenceDataset, || async { Ok(2) });
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.tiers[0].capability, CapabilityName::EnhancedAnalysis);
        assert_eq!(chain.tiers[1].capability, CapabilityName::ReferenceDataset);
    }

    #[test]
    fn outcome_from_first_tier_is_not_degraded() {
        let primary = FallbackOutcome {
            value: (),
            tier: CapabilityName::EnhancedAnalysis,
            tier_index: 0,
        };
        assert!(!primary.degraded());
        let secondary = FallbackOutcome {
            value: (),
            tier: CapabilityName::ReferenceDataset,
            tier_index: 1,
        };
        assert!(secondary.degraded());
    }
}
