//! Engine references
//!
//! An engine reference names an out-of-process engine and how to materialize
//! it as a runnable command. The grammar is:
//!
//! ```text
//! scheme://name[@version]
//! ```
//!
//! - **scheme**: how the engine is executed (`go`, `bin`, `file`, ...). Whether a
//!   scheme is supported is decided by the resolver, not by parsing.
//! - **name**: the engine's logical name, or a path for path-like schemes.
//! - **version**: optional pin. The `@` is split at its rightmost occurrence
//!   within the last path segment, so `@` elsewhere in the name is preserved.
//!
//! ```
//! use forge_core::EngineRef;
//!
//! let engine: EngineRef = "go://build-go@v0.9.0".parse().unwrap();
//! assert_eq!(engine.scheme(), "go");
//! assert_eq!(engine.name(), "build-go");
//! assert_eq!(engine.version(), Some("v0.9.0"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SCHEME_SEPARATOR: &str = "://";

/// Errors produced while parsing an engine reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRefError {
    /// The reference does not contain `://`
    MissingScheme(String),
    /// Nothing before `://`
    EmptyScheme(String),
    /// Nothing after `://` (or only a version)
    EmptyName(String),
    /// A trailing `@` with no version
    EmptyVersion(String),
}

impl fmt::Display for EngineRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScheme(s) => write!(f, "engine reference '{s}' has no scheme (expected scheme://name)"),
            Self::EmptyScheme(s) => write!(f, "engine reference '{s}' has an empty scheme"),
            Self::EmptyName(s) => write!(f, "engine reference '{s}' has an empty name"),
            Self::EmptyVersion(s) => write!(f, "engine reference '{s}' has an empty version after '@'"),
        }
    }
}

impl std::error::Error for EngineRefError {}

/// A parsed `scheme://name[@version]` engine reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineRef {
    scheme: String,
    name: String,
    version: Option<String>,
}

impl EngineRef {
    pub fn new(scheme: impl Into<String>, name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            scheme: scheme.into(),
            name: name.into(),
            version,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pinned version, if any
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl FromStr for EngineRef {
    type Err = EngineRefError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (scheme, rest) = input
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| EngineRefError::MissingScheme(input.to_string()))?;

        if scheme.is_empty() {
            return Err(EngineRefError::EmptyScheme(input.to_string()));
        }

        let segment_start = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, version) = match rest[segment_start..].rfind('@') {
            Some(at) => {
                let at = segment_start + at;
                let version = &rest[at + 1..];
                if version.is_empty() {
                    return Err(EngineRefError::EmptyVersion(input.to_string()));
                }
                (&rest[..at], Some(version.to_string()))
            }
            None => (rest, None),
        };

        if name.is_empty() {
            return Err(EngineRefError::EmptyName(input.to_string()));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SCHEME_SEPARATOR, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

impl Serialize for EngineRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EngineRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_version() {
        let engine: EngineRef = "bin://forge-engine".parse().unwrap();
        assert_eq!(engine.scheme(), "bin");
        assert_eq!(engine.name(), "forge-engine");
        assert!(engine.version().is_none());
        assert_eq!(engine.to_string(), "bin://forge-engine");
    }

    #[test]
    fn test_parse_with_version() {
        let engine: EngineRef = "go://go-gen-mocks@v1.2.3".parse().unwrap();
        assert_eq!(engine.name(), "go-gen-mocks");
        assert_eq!(engine.version(), Some("v1.2.3"));
        assert_eq!(engine.to_string(), "go://go-gen-mocks@v1.2.3");
    }

    #[test]
    fn test_at_sign_only_split_in_last_segment() {
        let engine: EngineRef = "file:///opt/user@host/bin/engine".parse().unwrap();
        assert_eq!(engine.name(), "/opt/user@host/bin/engine");
        assert!(engine.version().is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "forge-engine".parse::<EngineRef>(),
            Err(EngineRefError::MissingScheme(_))
        ));
        assert!(matches!(
            "://x".parse::<EngineRef>(),
            Err(EngineRefError::EmptyScheme(_))
        ));
        assert!(matches!(
            "go://".parse::<EngineRef>(),
            Err(EngineRefError::EmptyName(_))
        ));
        assert!(matches!(
            "go://@v1".parse::<EngineRef>(),
            Err(EngineRefError::EmptyName(_))
        ));
        assert!(matches!(
            "go://build-go@".parse::<EngineRef>(),
            Err(EngineRefError::EmptyVersion(_))
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let engine: EngineRef = "go://build-go@v1".parse().unwrap();
        let json = serde_json::to_string(&engine).unwrap();
        assert_eq!(json, "\"go://build-go@v1\"");
        let back: EngineRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, engine);
    }
}
