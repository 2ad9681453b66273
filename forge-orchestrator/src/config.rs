//! Orchestrator configuration
//!
//! Every environment-driven setting is read once at startup into [`Config`]
//! and passed down explicitly. Nothing below this module reads the process
//! environment.

use std::path::PathBuf;
use std::time::Duration;

use forge_client::{DEFAULT_ENGINE_TIMEOUT, ResolverConfig};

use crate::error::{OrchestratorError, Result};

/// Store location used when `FORGE_STORE_PATH` is unset
pub const DEFAULT_STORE_PATH: &str = ".forge/artifact-store.json";

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the JSON store file
    pub store_path: PathBuf,

    /// Rebuild everything, ignoring recorded dependencies
    pub force_rebuild: bool,

    /// How long one attempt waits for the store lock
    pub lock_timeout: Duration,

    /// How many times the store lock is attempted before giving up
    pub max_lock_attempts: u32,

    /// Deadline for a single engine call
    pub engine_timeout: Duration,

    /// Engine resolution settings
    pub resolver: ResolverConfig,
}

impl Config {
    /// Creates a configuration with defaults for the given store
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            force_rebuild: false,
            lock_timeout: Duration::from_millis(5000),
            max_lock_attempts: 3,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            resolver: ResolverConfig::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - FORGE_STORE_PATH (optional, default: ".forge/artifact-store.json")
    /// - FORGE_FORCE_REBUILD (optional, "1"/"true", default: false)
    /// - FORGE_LOCK_TIMEOUT_MS (optional, milliseconds, default: 5000)
    /// - FORGE_LOCK_ATTEMPTS (optional, default: 3)
    /// - FORGE_ENGINE_TIMEOUT (optional, seconds, default: 600)
    ///
    /// Resolver variables are documented on [`ResolverConfig::from_env`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup
    ///
    /// Unparsable numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::new(DEFAULT_STORE_PATH);

        let store_path = lookup("FORGE_STORE_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let force_rebuild = lookup("FORGE_FORCE_REBUILD")
            .map(|s| parse_flag(&s))
            .unwrap_or(false);

        let lock_timeout = lookup("FORGE_LOCK_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);

        let max_lock_attempts = lookup("FORGE_LOCK_ATTEMPTS")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(defaults.max_lock_attempts);

        let engine_timeout = lookup("FORGE_ENGINE_TIMEOUT")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.engine_timeout);

        Self {
            store_path,
            force_rebuild,
            lock_timeout,
            max_lock_attempts,
            engine_timeout,
            resolver: ResolverConfig::from_lookup(lookup),
        }
    }

    pub fn with_store_path(mut self, store_path: impl Into<PathBuf>) -> Self {
        self.store_path = store_path.into();
        self
    }

    pub fn with_force_rebuild(mut self, force_rebuild: bool) -> Self {
        self.force_rebuild = force_rebuild;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration, max_attempts: u32) -> Self {
        self.lock_timeout = lock_timeout;
        self.max_lock_attempts = max_attempts;
        self
    }

    pub fn with_engine_timeout(mut self, engine_timeout: Duration) -> Self {
        self.engine_timeout = engine_timeout;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(OrchestratorError::InvalidConfig(
                "store_path cannot be empty".to_string(),
            ));
        }

        if self.store_path.is_dir() {
            return Err(OrchestratorError::InvalidConfig(format!(
                "store_path {} is a directory",
                self.store_path.display()
            )));
        }

        if self.lock_timeout.is_zero() {
            return Err(OrchestratorError::InvalidConfig(
                "lock_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_lock_attempts == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "max_lock_attempts must be greater than 0".to_string(),
            ));
        }

        if self.engine_timeout.is_zero() {
            return Err(OrchestratorError::InvalidConfig(
                "engine_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_PATH)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert!(!config.force_rebuild);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.max_lock_attempts, 3);
        assert_eq!(config.engine_timeout, Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("FORGE_STORE_PATH", "/tmp/store.json"),
            ("FORGE_FORCE_REBUILD", "true"),
            ("FORGE_LOCK_TIMEOUT_MS", "250"),
            ("FORGE_LOCK_ATTEMPTS", "7"),
            ("FORGE_ENGINE_TIMEOUT", "30"),
            ("FORGE_ENGINE_VERSION", "v1.2.3"),
        ]));

        assert_eq!(config.store_path, PathBuf::from("/tmp/store.json"));
        assert!(config.force_rebuild);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.max_lock_attempts, 7);
        assert_eq!(config.engine_timeout, Duration::from_secs(30));
        assert_eq!(config.resolver.default_version, "v1.2.3");
    }

    #[test]
    fn test_force_flag_parsing() {
        for (value, expected) in [("1", true), ("TRUE", true), ("0", false), ("no", false), ("", false)] {
            let config = Config::from_lookup(lookup(&[("FORGE_FORCE_REBUILD", value)]));
            assert_eq!(config.force_rebuild, expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let config = Config::from_lookup(lookup(&[("FORGE_LOCK_ATTEMPTS", "many")]));
        assert_eq!(config.max_lock_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config::default().with_lock_timeout(Duration::ZERO, 3);
        assert!(config.validate().is_err());

        let config = Config::default().with_lock_timeout(Duration::from_secs(1), 0);
        assert!(config.validate().is_err());

        let config = Config::default().with_engine_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
