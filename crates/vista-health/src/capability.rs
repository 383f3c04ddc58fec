//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! Capability identities and per-capability breaker records.
//!
//! [`CapabilityRecord`] is the single shared mutable resource of the
//! subsystem: one live instance per capability, created at manager
//! initialisation, mutated only by the breaker, never destroyed. The
//! record implements the state machine; locking and notification live in
//! [`crate::breaker`].

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vista_common::config::CapabilityPolicy;
use vista_common::time::elapsed_since;

/// Backend capabilities supervised by the health manager.
///
/// A closed set: introducing a capability is a configuration and code
/// change, never a runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityName {
    /// ML-backed enhanced product analysis.
    EnhancedAnalysis,
    /// Vector-similarity search engine.
    VectorSearch,
    /// Reference-dataset lookup engine.
    ReferenceDataset,
    /// Vision/detection engine for camera captures.
    VisionDetection,
}

impl CapabilityName {
    /// Every supervised capability, in registration order.
    pub const ALL: [CapabilityName; 4] = [
        CapabilityName::EnhancedAnalysis,
        CapabilityName::VectorSearch,
        CapabilityName::ReferenceDataset,
        CapabilityName::VisionDetection,
    ];

    /// Stable label used in configuration keys, logs, and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityName::EnhancedAnalysis => "enhanced-analysis",
            CapabilityName::VectorSearch => "vector-search",
            CapabilityName::ReferenceDataset => "reference-dataset",
            CapabilityName::VisionDetection => "vision-detection",
        }
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapabilityName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "enhanced-analysis" => Ok(CapabilityName::EnhancedAnalysis),
            "vector-search" => Ok(CapabilityName::VectorSearch),
            "reference-dataset" => Ok(CapabilityName::ReferenceDataset),
            "vision-detection" => Ok(CapabilityName::VisionDetection),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Breaker state for one capability. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityState {
    /// Normal operation; calls pass through.
    Closed,
    /// Capability assumed down; calls are short-circuited until cooldown.
    Open,
    /// Cooldown elapsed; a single probe call tests recovery.
    HalfOpen,
}

impl CapabilityState {
    /// Stable label for logs, metrics, and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityState::Closed => "closed",
            CapabilityState::Open => "open",
            CapabilityState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an attempt was admitted by [`CapabilityRecord::may_attempt`].
///
/// The executor needs to know whether an attempt holds the half-open
/// probe slot: a cancelled probe must release the slot, while a
/// cancelled ordinary attempt must leave it alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The breaker is closed; an ordinary call proceeds.
    Standard,
    /// The call proceeds as the single half-open recovery probe.
    Probe,
    /// The breaker is open and cooling down, or a probe is in flight.
    Denied,
}

impl Admission {
    /// Whether the attempt may proceed at all.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Denied)
    }

    /// Whether the attempt occupies the half-open probe slot.
    pub fn holds_probe(&self) -> bool {
        matches!(self, Admission::Probe)
    }
}

/// Mutable health state for one capability.
#[derive(Debug)]
pub struct CapabilityRecord {
    name: CapabilityName,
    policy: CapabilityPolicy,
    state: CapabilityState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    state_changed_at: DateTime<Utc>,
}

impl CapabilityRecord {
    /// Create a fresh record in the closed state.
    pub fn new(name: CapabilityName, policy: CapabilityPolicy) -> Self {
        Self {
            name,
            policy,
            state: CapabilityState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            last_success_at: None,
            opened_at: None,
            probe_in_flight: false,
            state_changed_at: Utc::now(),
        }
    }

    /// Capability this record tracks.
    pub fn name(&self) -> CapabilityName {
        self.name
    }

    /// Current breaker state.
    pub fn state(&self) -> CapabilityState {
        self.state
    }

    /// Effective breaker thresholds.
    pub fn policy(&self) -> &CapabilityPolicy {
        &self.policy
    }

    /// Decide whether a call may be attempted right now.
    ///
    /// Open records transition to half-open lazily here once the cooldown
    /// has elapsed; the transition is never timer-driven. Only one caller
    /// wins the probe slot: while a probe is in flight every other caller
    /// is told to stand down. The returned [`Admission`] tells the caller
    /// whether its attempt holds the probe slot.
    pub fn may_attempt(&mut self, now: Instant) -> (Admission, Option<CapabilityState>) {
        match self.state {
            CapabilityState::Closed => (Admission::Standard, None),
            CapabilityState::Open => {
                let opened_at = match self.opened_at {
                    Some(at) => at,
                    // Open without a timestamp cannot happen through the
                    // public API; recover by allowing the probe.
                    None => return (Admission::Probe, Some(self.enter_half_open())),
                };
                if elapsed_since(opened_at, now) >= self.policy.cooldown {
                    let transition = self.enter_half_open();
                    (Admission::Probe, Some(transition))
                } else {
                    (Admission::Denied, None)
                }
            }
            CapabilityState::HalfOpen => {
                if self.probe_in_flight {
                    (Admission::Denied, None)
                } else {
                    self.probe_in_flight = true;
                    (Admission::Probe, None)
                }
            }
        }
    }

    /// Record a successful invocation outcome.
    pub fn record_success(&mut self, now: Instant) -> Option<CapabilityState> {
        self.last_success_at = Some(now);
        self.consecutive_failures = 0;
        self.probe_in_flight = false;
        match self.state {
            CapabilityState::Closed => {
                self.consecutive_successes = self.consecutive_successes.saturating_add(1);
                None
            }
            CapabilityState::HalfOpen => {
                self.consecutive_successes = self.consecutive_successes.saturating_add(1);
                if self.consecutive_successes >= self.policy.successes_to_close {
                    Some(self.enter_closed())
                } else {
                    None
                }
            }
            // A success can land while open when an invocation that began
            // before the trip resolves late; the cooldown still applies.
            CapabilityState::Open => None,
        }
    }

    /// Record a failed invocation outcome.
    pub fn record_failure(&mut self, now: Instant) -> Option<CapabilityState> {
        self.last_failure_at = Some(now);
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
        match self.state {
            CapabilityState::Closed => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= self.policy.failure_threshold {
                    Some(self.enter_open(now))
                } else {
                    None
                }
            }
            // A single probe failure re-opens immediately; repeated probing
            // must not worsen an already-struggling dependency.
            CapabilityState::HalfOpen => Some(self.enter_open(now)),
            CapabilityState::Open => None,
        }
    }

    /// Release the probe slot without recording an outcome.
    ///
    /// Used when a probe attempt is cancelled by the caller: cancellation
    /// is not attributed to the dependency, but the slot must free up so
    /// another caller can probe.
    pub fn abandon_probe(&mut self) {
        self.probe_in_flight = false;
    }

    /// Force the record back to closed with zeroed counters.
    pub fn reset(&mut self) -> Option<CapabilityState> {
        let was = self.state;
        let transition = (was != CapabilityState::Closed).then(|| self.enter_closed());
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
        self.opened_at = None;
        transition
    }

    /// Immutable copy of the record for observers.
    pub fn snapshot(&self, now: Instant) -> CapabilitySnapshot {
        let cooldown_remaining = match (self.state, self.opened_at) {
            (CapabilityState::Open, Some(at)) => Some(
                self.policy
                    .cooldown
                    .saturating_sub(elapsed_since(at, now)),
            ),
            _ => None,
        };
        CapabilitySnapshot {
            name: self.name,
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            cooldown_remaining,
            state_changed_at: self.state_changed_at,
        }
    }

    fn enter_open(&mut self, now: Instant) -> CapabilityState {
        self.state = CapabilityState::Open;
        self.opened_at = Some(now);
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
        self.state_changed_at = Utc::now();
        CapabilityState::Open
    }

    fn enter_half_open(&mut self) -> CapabilityState {
        self.state = CapabilityState::HalfOpen;
        self.opened_at = None;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probe_in_flight = true;
        self.state_changed_at = Utc::now();
        CapabilityState::HalfOpen
    }

    fn enter_closed(&mut self) -> CapabilityState {
        self.state = CapabilityState::Closed;
        self.opened_at = None;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
        self.state_changed_at = Utc::now();
        CapabilityState::Closed
    }
}

/// Point-in-time copy of one capability record.
#[derive(Debug, Clone)]
pub struct CapabilitySnapshot {
    /// Capability the snapshot describes.
    pub name: CapabilityName,
    /// Breaker state at snapshot time.
    pub state: CapabilityState,
    /// Consecutive failure count.
    pub consecutive_failures: u32,
    /// Consecutive success count.
    pub consecutive_successes: u32,
    /// Time remaining before a recovery probe is allowed, when open.
    pub cooldown_remaining: Option<Duration>,
    /// Wall-clock time of the last state transition.
    pub state_changed_at: DateTime<Utc>,
}
