//! ---
//! vista_section: "01-core-functionality"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Shared primitives for the service-health workspace."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_mode() -> Mode {
    Mode::Production
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown() -> Duration {
    Duration::from_secs(30)
}

fn default_successes_to_close() -> u32 {
    2
}

fn default_critical_fraction() -> f64 {
    0.5
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    "0.0.0.0:9464"
        .parse()
        .expect("valid default metrics address")
}

/// Primary configuration object for the service-health runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "VISTA_CONFIG";

    /// Load configuration from disk, respecting the `VISTA_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.health.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Operating mode for the storefront runtime.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

impl Mode {
    pub fn is_development(&self) -> bool {
        matches!(self, Mode::Development)
    }
}

/// Configuration for the health manager: per-capability breaker policies and
/// the aggregate classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HealthConfig {
    /// Policy applied to capabilities without an explicit entry below.
    #[serde(default)]
    pub default_policy: CapabilityPolicy,
    /// Per-capability overrides keyed by capability name (kebab-case).
    #[serde(default)]
    pub capabilities: IndexMap<String, CapabilityPolicy>,
    /// Thresholds used to classify overall system health.
    #[serde(default)]
    pub aggregation: HealthPolicy,
}

impl HealthConfig {
    /// Resolve the effective policy for a capability name.
    pub fn policy_for(&self, name: &str) -> CapabilityPolicy {
        self.capabilities
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_policy.clone())
    }

    pub fn validate(&self) -> Result<()> {
        self.default_policy.validate("default")?;
        for (name, policy) in &self.capabilities {
            policy.validate(name)?;
        }
        self.aggregation.validate()?;
        Ok(())
    }
}

/// Immutable breaker thresholds for a single capability.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    /// Consecutive failures required to trip the breaker open.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time the breaker must stay open before a recovery probe is allowed.
    #[serde(default = "default_cooldown")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub cooldown: Duration,
    /// Consecutive half-open successes required to close the breaker again.
    #[serde(default = "default_successes_to_close")]
    pub successes_to_close: u32,
}

impl CapabilityPolicy {
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(anyhow!(
                "capability '{}': failure_threshold must be at least 1",
                name
            ));
        }
        if self.successes_to_close == 0 {
            return Err(anyhow!(
                "capability '{}': successes_to_close must be at least 1",
                name
            ));
        }
        Ok(())
    }
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown: default_cooldown(),
            successes_to_close: default_successes_to_close(),
        }
    }
}

/// Thresholds for classifying overall system health.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthPolicy {
    /// Fraction of unavailable capabilities above which the system is critical.
    #[serde(default = "default_critical_fraction")]
    pub critical_fraction: f64,
}

impl HealthPolicy {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.critical_fraction) || self.critical_fraction == 0.0 {
            return Err(anyhow!(
                "aggregation critical_fraction must be within (0, 1], got {}",
                self.critical_fraction
            ));
        }
        Ok(())
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            critical_fraction: default_critical_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_policy() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.health.default_policy.failure_threshold, 3);
        assert_eq!(config.health.default_policy.cooldown, Duration::from_secs(30));
        assert_eq!(config.health.default_policy.successes_to_close, 2);
        assert!((config.health.aggregation.critical_fraction - 0.5).abs() < f64::EPSILON);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen, "0.0.0.0:9464".parse().unwrap());
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn per_capability_override_wins() {
        let config: AppConfig = r#"
            [health.capabilities.vector-search]
            failure_threshold = 5
            cooldown = 10
        "#
        .parse()
        .unwrap();
        let vector = config.health.policy_for("vector-search");
        assert_eq!(vector.failure_threshold, 5);
        assert_eq!(vector.cooldown, Duration::from_secs(10));
        // Untouched fields fall back to the serde defaults.
        assert_eq!(vector.successes_to_close, 2);
        let other = config.health.policy_for("vision-detection");
        assert_eq!(other, CapabilityPolicy::default());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let err = r#"
            [health.default_policy]
            failure_threshold = 0
        "#
        .parse::<AppConfig>()
        .unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));
    }

    #[test]
    fn load_reads_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vista.toml");
        fs::write(&path, "mode = \"development\"\n").unwrap();
        let missing = dir.path().join("absent.toml");
        let loaded = AppConfig::load_with_source(&[missing, path.clone()]).unwrap();
        assert_eq!(loaded.source, path);
        assert!(loaded.config.mode.is_development());
    }
}
