//! Engine reference resolution
//!
//! Maps an [`EngineRef`] to the command line that runs it. Supported schemes:
//! - `go://name[@version]`: fetch-and-run a versioned package with `go run`
//! - `bin://name`: a locally built binary found in the search path
//! - `file:///abs/path`: an explicit executable

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use forge_core::EngineRef;
use tracing::debug;

use crate::error::ResolveError;

/// Version used when a versioned engine is neither pinned nor built with one
pub const DEFAULT_ENGINE_VERSION: &str = "latest";

/// Module prefix under which `go://` engines live
pub const DEFAULT_GO_MODULE: &str = "github.com/alexandremahdhaoui/forge";

/// Version baked in at build time, if the build provided one
pub const BUILD_VERSION: Option<&str> = option_env!("FORGE_BUILD_VERSION");

/// A runnable engine command line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedEngine {
    pub command: String,
    pub args: Vec<String>,
}

impl ResolvedEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl fmt::Display for ResolvedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Resolver settings
///
/// Built once at startup and passed to the resolver; the resolver itself never
/// reads the process environment.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Version for versioned schemes when nothing else applies
    pub default_version: String,

    /// Module prefix for `go://` engines
    pub go_module: String,

    /// Directories searched, in order, for `bin://` engines
    pub search_paths: Vec<PathBuf>,
}

impl ResolverConfig {
    /// Creates resolver settings from environment variables
    ///
    /// Expected environment variables:
    /// - FORGE_ENGINE_VERSION (optional, default: "latest")
    /// - FORGE_GO_MODULE (optional)
    /// - FORGE_ENGINE_PATH (optional, ':'-separated, searched before PATH)
    /// - PATH
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates resolver settings from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_version = lookup("FORGE_ENGINE_VERSION")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENGINE_VERSION.to_string());

        let go_module = lookup("FORGE_GO_MODULE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GO_MODULE.to_string());

        let mut search_paths = Vec::new();
        for var in ["FORGE_ENGINE_PATH", "PATH"] {
            if let Some(value) = lookup(var) {
                search_paths.extend(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
            }
        }

        Self {
            default_version,
            go_module,
            search_paths,
        }
    }

    /// Adds a directory in front of the search path
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.insert(0, dir.into());
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_version: DEFAULT_ENGINE_VERSION.to_string(),
            go_module: DEFAULT_GO_MODULE.to_string(),
            search_paths: Vec::new(),
        }
    }
}

/// Resolves engine references to command lines
///
/// Resolutions are memoized per `(reference, version)` so that repeated
/// lookups within one build return the same command even if the search path
/// contents change mid-build.
#[derive(Debug)]
pub struct Resolver {
    config: ResolverConfig,
    cache: Mutex<HashMap<(EngineRef, Option<String>), ResolvedEngine>>,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Parses and resolves a reference string
    pub fn resolve_str(
        &self,
        engine: &str,
        version: Option<&str>,
    ) -> Result<ResolvedEngine, ResolveError> {
        let engine: EngineRef = engine.parse()?;
        self.resolve(&engine, version)
    }

    /// Resolves a reference
    ///
    /// # Arguments
    /// * `engine` - The engine reference
    /// * `version` - The build-time version, used when the reference is not pinned
    pub fn resolve(
        &self,
        engine: &EngineRef,
        version: Option<&str>,
    ) -> Result<ResolvedEngine, ResolveError> {
        let key = (engine.clone(), version.map(str::to_string));

        if let Some(hit) = self.lock_cache().get(&key) {
            return Ok(hit.clone());
        }

        let resolved = self.resolve_uncached(engine, version)?;
        debug!("Resolved engine {} to '{}'", engine, resolved);

        self.lock_cache().insert(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(
        &self,
        engine: &EngineRef,
        version: Option<&str>,
    ) -> Result<ResolvedEngine, ResolveError> {
        match engine.scheme() {
            "go" => {
                let version = engine
                    .version()
                    .or(version)
                    .filter(|v| !v.is_empty())
                    .unwrap_or(self.config.default_version.as_str());
                let package = format!(
                    "{}/cmd/{}@{}",
                    self.config.go_module.trim_end_matches('/'),
                    engine.name(),
                    version
                );
                Ok(ResolvedEngine::new("go", vec!["run".to_string(), package]))
            }
            "bin" => self
                .config
                .search_paths
                .iter()
                .map(|dir| dir.join(engine.name()))
                .find(|candidate| candidate.is_file())
                .map(|path| ResolvedEngine::new(path.display().to_string(), Vec::new()))
                .ok_or_else(|| ResolveError::EngineNotFound {
                    engine: engine.to_string(),
                    searched: self.config.search_paths.clone(),
                }),
            "file" => {
                let path = Path::new(engine.name());
                if path.is_absolute() && path.is_file() {
                    Ok(ResolvedEngine::new(engine.name(), Vec::new()))
                } else {
                    Err(ResolveError::EngineNotFound {
                        engine: engine.to_string(),
                        searched: vec![path.to_path_buf()],
                    })
                }
            }
            other => Err(ResolveError::UnknownScheme {
                scheme: other.to_string(),
                engine: engine.to_string(),
            }),
        }
    }

    fn lock_cache(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(EngineRef, Option<String>), ResolvedEngine>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
