//! Location conventions for step outputs and staged artifacts.

use std::fmt::Debug;

/// Derives the default locations a pipeline writes to.
pub trait PipelineNaming: Debug + Send + Sync {
    /// Directory a step writes its output to when no override is given.
    fn default_output_path(&self, pipeline: &str, step: &str) -> String;

    /// Remote location a step's local file is staged to.
    fn artifact_uri(&self, pipeline: &str, step: &str, file_name: &str) -> String;
}

/// Lays paths out below two S3 prefixes.
///
/// - outputs: `<output_root>/<pipeline>/<step>/`
/// - artifacts: `<artifact_root>/<pipeline>/<step>/<file name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Naming {
    output_root: String,
    artifact_root: String,
}

impl S3Naming {
    pub fn new(output_root: impl Into<String>, artifact_root: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            artifact_root: artifact_root.into(),
        }
    }
}

impl PipelineNaming for S3Naming {
    fn default_output_path(&self, pipeline: &str, step: &str) -> String {
        as_directory(&join_uri(&join_uri(&self.output_root, pipeline), step))
    }

    fn artifact_uri(&self, pipeline: &str, step: &str, file_name: &str) -> String {
        join_uri(
            &join_uri(&join_uri(&self.artifact_root, pipeline), step),
            file_name,
        )
    }
}

/// Joins a segment onto a base with exactly one `/` between them.
pub fn join_uri(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    if segment.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, segment)
}

/// Normalizes a path to directory form (trailing `/`).
pub fn as_directory(path: &str) -> String {
    let path = path.trim();
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}
