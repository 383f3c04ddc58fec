//! ---
//! vista_section: "01-core-functionality"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Shared primitives for the service-health workspace."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
use std::time::{Duration, Instant};

/// Capture an instant suitable for cooldown comparisons.
pub fn monotonic_now() -> Instant {
    Instant::now()
}

/// Elapsed time since `earlier`, saturating to zero if the clock ever reads
/// backwards across threads.
pub fn elapsed_since(earlier: Instant, now: Instant) -> Duration {
    now.checked_duration_since(earlier).unwrap_or_default()
}
