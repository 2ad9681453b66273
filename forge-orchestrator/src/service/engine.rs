//! Engine capabilities
//!
//! Services talk to engines through the [`Builder`], [`TestRunner`] and
//! [`DependencyDetector`] traits. [`SubprocessEngine`] implements all three
//! over the stdio client; tests substitute in-memory implementations through
//! an [`EngineProvider`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use forge_client::{ClientError, EngineClient, Resolver};
use forge_client::detect::detect_dependencies;
use forge_core::EngineRef;
use forge_core::domain::artifact::{Artifact, ArtifactDependency};
use forge_core::domain::test_report::TestReport;
use forge_core::dto::build::{BUILD_TOOL, BuildInput};
use forge_core::dto::test::{RUN_TESTS_TOOL, RunTestsInput};
use thiserror::Error;

use crate::config::Config;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Engine '{engine}' returned no {expected} from '{tool}'")]
    MissingPayload {
        engine: String,
        tool: String,
        expected: &'static str,
    },

    #[error("Engine '{engine}' returned an invalid artifact: {message}")]
    InvalidArtifact { engine: String, message: String },
}

/// Produces an artifact from a build request
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, input: &BuildInput) -> Result<Artifact, EngineError>;
}

/// Runs one test stage
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_tests(&self, input: &RunTestsInput) -> Result<TestReport, EngineError>;
}

/// Reports which files a build in `work_dir` depends on
#[async_trait]
pub trait DependencyDetector: Send + Sync {
    async fn detect_dependencies(
        &self,
        work_dir: &Path,
    ) -> Result<Vec<ArtifactDependency>, EngineError>;
}

/// Maps engine references to capabilities
///
/// Resolution happens here, so an unusable reference fails before any work
/// is attempted.
pub trait EngineProvider: Send + Sync {
    fn builder(&self, engine: &EngineRef) -> Result<Arc<dyn Builder>, EngineError>;
    fn test_runner(&self, engine: &EngineRef) -> Result<Arc<dyn TestRunner>, EngineError>;
    fn detector(&self, engine: &EngineRef) -> Result<Arc<dyn DependencyDetector>, EngineError>;
}

/// An engine spawned as a subprocess for every call
#[derive(Debug, Clone)]
pub struct SubprocessEngine {
    engine: EngineRef,
    client: EngineClient,
}

impl SubprocessEngine {
    pub fn new(engine: EngineRef, client: EngineClient) -> Self {
        Self { engine, client }
    }

    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }
}

#[async_trait]
impl Builder for SubprocessEngine {
    async fn build(&self, input: &BuildInput) -> Result<Artifact, EngineError> {
        let result = self.client.invoke(&self.engine, BUILD_TOOL, input).await?;

        let artifact = result.artifact.ok_or_else(|| EngineError::MissingPayload {
            engine: self.engine.to_string(),
            tool: BUILD_TOOL.to_string(),
            expected: "artifact",
        })?;

        artifact
            .validate()
            .map_err(|message| EngineError::InvalidArtifact {
                engine: self.engine.to_string(),
                message,
            })?;

        Ok(artifact)
    }
}

#[async_trait]
impl TestRunner for SubprocessEngine {
    async fn run_tests(&self, input: &RunTestsInput) -> Result<TestReport, EngineError> {
        let result = self
            .client
            .invoke(&self.engine, RUN_TESTS_TOOL, input)
            .await?;

        result.test_report.ok_or_else(|| EngineError::MissingPayload {
            engine: self.engine.to_string(),
            tool: RUN_TESTS_TOOL.to_string(),
            expected: "test report",
        })
    }
}

#[async_trait]
impl DependencyDetector for SubprocessEngine {
    async fn detect_dependencies(
        &self,
        work_dir: &Path,
    ) -> Result<Vec<ArtifactDependency>, EngineError> {
        Ok(detect_dependencies(&self.client, &self.engine, work_dir).await?)
    }
}

/// Provides [`SubprocessEngine`]s sharing one resolver
#[derive(Debug, Clone)]
pub struct SubprocessEngineProvider {
    client: EngineClient,
}

impl SubprocessEngineProvider {
    pub fn new(client: EngineClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Self {
        let resolver = Arc::new(Resolver::new(config.resolver.clone()));
        Self::new(EngineClient::new(resolver, config.engine_timeout))
    }

    fn engine(&self, engine: &EngineRef) -> Result<SubprocessEngine, EngineError> {
        self.client
            .resolver()
            .resolve(engine, forge_client::BUILD_VERSION)
            .map_err(ClientError::from)?;
        Ok(SubprocessEngine::new(engine.clone(), self.client.clone()))
    }
}

impl EngineProvider for SubprocessEngineProvider {
    fn builder(&self, engine: &EngineRef) -> Result<Arc<dyn Builder>, EngineError> {
        Ok(Arc::new(self.engine(engine)?))
    }

    fn test_runner(&self, engine: &EngineRef) -> Result<Arc<dyn TestRunner>, EngineError> {
        Ok(Arc::new(self.engine(engine)?))
    }

    fn detector(&self, engine: &EngineRef) -> Result<Arc<dyn DependencyDetector>, EngineError> {
        Ok(Arc::new(self.engine(engine)?))
    }
}
