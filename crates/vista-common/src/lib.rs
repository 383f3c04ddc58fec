//! ---
//! vista_section: "01-core-functionality"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Shared primitives for the service-health workspace."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! Shared primitives for the VISTA service-health workspace.
//! This crate exposes configuration loading, tracing initialisation, and
//! monotonic time helpers consumed by the health manager and its tests.
//!
//! Embedding applications call [`logging::init_tracing`] once at startup
//! with the loaded [`config::LoggingConfig`], and hand
//! [`config::MetricsConfig`]'s listen address to the metrics crate's
//! scrape-endpoint spawner.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AppConfig, CapabilityPolicy, HealthConfig, HealthPolicy, LoggingConfig, MetricsConfig, Mode,
};
pub use logging::{init_tracing, LogFormat};
pub use time::monotonic_now;
