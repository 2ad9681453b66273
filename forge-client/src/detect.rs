//! Dependency detection round-trip
//!
//! After a builder produces an artifact it asks a detector engine which files
//! the build depended on. Detection is advisory: if it fails the artifact is
//! kept with no dependencies, which makes every future build rebuild it.

use std::path::Path;

use forge_core::EngineRef;
use forge_core::domain::artifact::{Artifact, ArtifactDependency};
use forge_core::dto::detect::{
    DETECT_DEPENDENCIES_TOOL, DetectDependenciesInput, DetectDependenciesOutput,
};
use tracing::{debug, warn};

use crate::EngineClient;
use crate::error::{ClientError, Result};

/// Calls `detectDependencies` on `detector` for `work_dir`
///
/// Relative paths in the answer are dropped with a warning.
pub async fn detect_dependencies(
    client: &EngineClient,
    detector: &EngineRef,
    work_dir: &Path,
) -> Result<Vec<ArtifactDependency>> {
    let input = DetectDependenciesInput {
        work_dir: work_dir.display().to_string(),
    };

    let result = client
        .invoke(detector, DETECT_DEPENDENCIES_TOOL, &input)
        .await?;

    let output: DetectDependenciesOutput = match result.output {
        Some(value) => serde_json::from_value(value).map_err(|e| ClientError::Protocol {
            engine: detector.to_string(),
            message: format!("invalid detectDependencies output: {}", e),
        })?,
        None => DetectDependenciesOutput::default(),
    };

    let (absolute, relative): (Vec<_>, Vec<_>) = output
        .dependencies
        .into_iter()
        .partition(|dep| dep.file_path.is_absolute());

    for dep in &relative {
        warn!(
            "Detector {} reported relative path '{}', ignoring it",
            detector,
            dep.file_path.display()
        );
    }

    debug!(
        "Detector {} reported {} dependencies for {}",
        detector,
        absolute.len(),
        work_dir.display()
    );

    Ok(absolute)
}

/// Runs the detector and stitches its answer into `artifact`
///
/// Never fails: an empty `detector`, an unparsable reference or any
/// invocation error yields an artifact with empty `dependencies` and a logged
/// warning. The detector reference is recorded whenever one was given, so a
/// later build knows which detector to ask.
pub async fn attach_dependencies(
    client: &EngineClient,
    artifact: Artifact,
    detector: &str,
    work_dir: &Path,
) -> Artifact {
    let detector = detector.trim();
    if detector.is_empty() {
        debug!(
            "No dependency detector for artifact '{}', it will always be rebuilt",
            artifact.name
        );
        return artifact.with_dependencies(Vec::new(), "");
    }

    let engine: EngineRef = match detector.parse() {
        Ok(engine) => engine,
        Err(e) => {
            warn!(
                "Invalid dependency detector '{}' for artifact '{}': {}",
                detector, artifact.name, e
            );
            return artifact.with_dependencies(Vec::new(), detector);
        }
    };

    match detect_dependencies(client, &engine, work_dir).await {
        Ok(dependencies) => artifact.with_dependencies(dependencies, detector),
        Err(e) => {
            warn!(
                "Dependency detection for artifact '{}' failed, it will always be rebuilt: {}",
                artifact.name, e
            );
            artifact.with_dependencies(Vec::new(), detector)
        }
    }
}
