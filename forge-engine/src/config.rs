//! Engine configuration
//!
//! Settings for the reference engine, read once when the process starts.

use std::time::Duration;

use forge_client::{DEFAULT_ENGINE_TIMEOUT, ResolverConfig};

/// Detector used by the `build` tool when the build spec names none
pub const DEFAULT_DETECTOR: &str = "bin://forge-engine";

/// Directory names never descended into by `detectDependencies`
pub const DEFAULT_SKIP_DIRS: &[&str] = &["target", "node_modules"];

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name reported in the `initialize` handshake
    pub name: String,

    /// Version reported in the `initialize` handshake
    pub version: String,

    /// Detector engine used when a build spec names none
    pub default_detector: String,

    /// Deadline for the detector round-trip
    pub detector_timeout: Duration,

    /// Directory names skipped while detecting dependencies
    pub skip_dirs: Vec<String>,

    /// Resolution settings for the detector engine
    pub resolver: ResolverConfig,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            default_detector: DEFAULT_DETECTOR.to_string(),
            detector_timeout: DEFAULT_ENGINE_TIMEOUT,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            resolver: ResolverConfig::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - FORGE_DEFAULT_DETECTOR (optional, default: "bin://forge-engine")
    /// - FORGE_ENGINE_TIMEOUT (optional, seconds, default: 600)
    /// - FORGE_SKIP_DIRS (optional, ','-separated, default: "target,node_modules")
    pub fn from_env() -> Self {
        let defaults = Self::new();

        let default_detector = std::env::var("FORGE_DEFAULT_DETECTOR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.default_detector);

        let detector_timeout = std::env::var("FORGE_ENGINE_TIMEOUT")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.detector_timeout);

        let skip_dirs = std::env::var("FORGE_SKIP_DIRS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.skip_dirs);

        Self {
            default_detector,
            detector_timeout,
            skip_dirs,
            resolver: ResolverConfig::from_env(),
            ..defaults
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_detector.trim().is_empty() {
            anyhow::bail!("default_detector cannot be empty");
        }

        self.default_detector
            .parse::<forge_core::EngineRef>()
            .map_err(|e| anyhow::anyhow!("default_detector is invalid: {}", e))?;

        if self.detector_timeout.is_zero() {
            anyhow::bail!("detector_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::new();
        assert_eq!(config.name, "forge-engine");
        assert_eq!(config.default_detector, DEFAULT_DETECTOR);
        assert!(config.skip_dirs.contains(&"target".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_detector() {
        let mut config = Config::new();
        config.default_detector = "not-a-reference".to_string();
        assert!(config.validate().is_err());

        config.default_detector = DEFAULT_DETECTOR.to_string();
        config.detector_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
