//! Tools served by the reference engine

mod build;
mod command;
mod detect;

pub use build::{ARTIFACT_KIND, BuildTool};
pub use detect::DetectTool;
pub use run_tests::RunTestsTool;
