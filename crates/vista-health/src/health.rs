//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! System-wide health aggregation.
//!
//! The snapshot is a pure function of the current capability states,
//! recomputed on every read. It is never stored as authoritative state.

use std::fmt;

use serde::{Deserialize, Serialize};
use vista_common::config::HealthPolicy;

use crate::capability::{CapabilityName, CapabilityState};

/// Overall health classification exposed to presentation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    /// Every capability is closed.
    Healthy,
    /// Some capabilities are unavailable or probing, the system runs with
    /// reduced functionality.
    Degraded,
    /// A majority of capabilities are unavailable.
    Critical,
}

impl OverallHealth {
    /// Represent the level as a static label for metrics and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallHealth::Healthy => "healthy",
            OverallHealth::Degraded => "degraded",
            OverallHealth::Critical => "critical",
        }
    }
}

impl fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived snapshot summarising every capability's breaker state.
#[derive(Debug, Clone)]
pub struct SystemHealthSnapshot {
    /// Overall classification.
    pub overall: OverallHealth,
    /// Number of supervised capabilities.
    pub total_services: usize,
    /// Capabilities whose breaker is open.
    pub unavailable_services: Vec<CapabilityName>,
    /// Capabilities whose breaker is half-open.
    pub degraded_services: Vec<CapabilityName>,
}

impl SystemHealthSnapshot {
    /// Express the snapshot in a lightweight JSON payload for status APIs.
    pub fn as_status_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "overall": self.overall.as_str(),
            "total_services": self.total_services,
            "unavailable_services": self.unavailable_services,
            "degraded_services": self.degraded_services,
        })
    }
}

/// Classify the current capability states under the provided policy.
///
/// Critical when unavailable capabilities exceed `critical_fraction` of
/// the total; degraded when anything is open or half-open; healthy
/// otherwise. A single flaky dependency therefore reads as degraded
/// while a majority outage reads as critical.
pub fn aggregate(
    policy: &HealthPolicy,
    states: &[(CapabilityName, CapabilityState)],
) -> SystemHealthSnapshot {
    let mut unavailable = Vec::new();
    let mut degraded = Vec::new();
    for (name, state) in states {
        match state {
            CapabilityState::Open => unavailable.push(*name),
            CapabilityState::HalfOpen => degraded.push(*name),
            CapabilityState::Closed => {}
        }
    }

    let total = states.len();
    let overall = if unavailable.len() as f64 > total as f64 * policy.critical_fraction {
        OverallHealth::Critical
    } else if !unavailable.is_empty() || !degraded.is_empty() {
        OverallHealth::Degraded
    } else {
        OverallHealth::Healthy
    };

    SystemHealthSnapshot {
        overall,
        total_services: total,
        unavailable_services: unavailable,
        degraded_services: degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(open: usize, half_open: usize) -> Vec<(CapabilityName, CapabilityState)> {
        CapabilityName::ALL
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let state = if index < open {
                    CapabilityState::Open
                } else if index < open + half_open {
                    CapabilityState::HalfOpen
                } else {
                    CapabilityState::Closed
                };
                (name, state)
            })
            .collect()
    }

    #[test]
    fn all_closed_is_healthy() {
        let snapshot = aggregate(&HealthPolicy::default(), &states(0, 0));
        assert_eq!(snapshot.overall, OverallHealth::Healthy);
        assert_eq!(snapshot.total_services, 4);
        assert!(snapshot.unavailable_services.is_empty());
        assert!(snapshot.degraded_services.is_empty());
    }

    #[test]
    fn one_open_of_four_is_degraded() {
        let snapshot = aggregate(&HealthPolicy::default(), &states(1, 0));
        assert_eq!(snapshot.overall, OverallHealth::Degraded);
        assert_eq!(snapshot.unavailable_services.len(), 1);
    }

    #[test]
    fn half_open_alone_is_degraded() {
        let snapshot = aggregate(&HealthPolicy::default(), &states(0, 1));
        assert_eq!(snapshot.overall, OverallHealth::Degraded);
        assert_eq!(snapshot.degraded_services.len(), 1);
    }

    #[test]
    fn exactly_half_open_is_still_degraded() {
        // 2 of 4 is not strictly more than half.
        let snapshot = aggregate(&HealthPolicy::default(), &states(2, 0));
        assert_eq!(snapshot.overall, OverallHealth::Degraded);
    }

    #[test]
    fn three_open_of_four_is_critical() {
        let snapshot = aggregate(&HealthPolicy::default(), &states(3, 0));
        assert_eq!(snapshot.overall, OverallHealth::Critical);
        assert_eq!(snapshot.unavailable_services.len(), 3);
    }

    #[test]
    fn custom_fraction_shifts_the_critical_line() {
        let policy = HealthPolicy {
            critical_fraction: 0.25,
        };
        let snapshot = aggregate(&policy, &states(2, 0));
        assert_eq!(snapshot.overall, OverallHealth::Critical);
    }

    #[test]
    fn status_payload_carries_service_lists() {
        let snapshot = aggregate(&HealthPolicy::default(), &states(1, 1));
        let payload = snapshot.as_status_payload();
        assert_eq!(payload["overall"], "degraded");
        assert_eq!(payload["total_services"], 4);
        assert_eq!(payload["unavailable_services"][0], "enhanced-analysis");
        assert_eq!(payload["degraded_services"][0], "vector-search");
    }
}
