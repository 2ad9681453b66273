//! Forge Engine
//!
//! The engine side of the stdio tool protocol, plus the reference engine's
//! tools. Other engines can reuse [`server::EngineServer`] and implement
//! [`server::ToolHandler`] for their own tools.

pub mod config;
pub mod server;
pub mod tools;

use std::sync::Arc;

use forge_client::{EngineClient, Resolver};

use crate::config::Config;
use crate::server::EngineServer;
use crate::tools::{BuildTool, DetectTool, RunTestsTool};

/// Builds a server exposing `build`, `runTests` and `detectDependencies`
pub fn reference_server(config: &Config) -> EngineServer {
    let resolver = Arc::new(Resolver::new(config.resolver.clone()));
    let client = EngineClient::new(resolver, config.detector_timeout);

    EngineServer::new(&config.name, &config.version)
        .register(Arc::new(BuildTool::new(client, &config.default_detector)))
        .register(Arc::new(RunTestsTool))
        .register(Arc::new(DetectTool::new(config.skip_dirs.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_server_tools() {
        let info = reference_server(&Config::new()).info();
        assert_eq!(info.name, "forge-engine");
        assert_eq!(info.tools, vec!["build", "detectDependencies", "runTests"]);
    }
}
