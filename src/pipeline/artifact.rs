//! Staging references for scripts and additional files.
//!
//! Staging only decides where a local file will live remotely. Nothing is
//! read or uploaded here; the uploader consumes the recorded references
//! after the build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use super::naming::PipelineNaming;
use crate::error::StepError;

/// A local file paired with the remote location it is staged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub local_path: PathBuf,
    pub uri: String,
}

/// Activities only see the remote location.
impl Serialize for ArtifactRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.uri)
    }
}

/// Stages the files of one step.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactStager<'a> {
    naming: &'a dyn PipelineNaming,
    pipeline: &'a str,
    step: &'a str,
}

impl<'a> ArtifactStager<'a> {
    pub fn new(naming: &'a dyn PipelineNaming, pipeline: &'a str, step: &'a str) -> Self {
        Self {
            naming,
            pipeline,
            step,
        }
    }

    /// Creates the staged reference for `local_path`.
    ///
    /// # Errors
    ///
    /// Returns `StepError::MissingArtifact` if the path is blank or does not
    /// end in a file name.
    pub fn stage(&self, local_path: &Path) -> Result<ArtifactRef, StepError> {
        if local_path.to_string_lossy().trim().is_empty() {
            return Err(StepError::MissingArtifact {
                step: self.step.to_string(),
                message: "path is empty".to_string(),
            });
        }

        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy())
            .ok_or_else(|| StepError::MissingArtifact {
                step: self.step.to_string(),
                message: format!("'{}' does not name a file", local_path.display()),
            })?;

        Ok(ArtifactRef {
            local_path: local_path.to_path_buf(),
            uri: self.naming.artifact_uri(self.pipeline, self.step, &file_name),
        })
    }

    /// Stages every path in order, stopping at the first failure.
    pub fn stage_all(&self, paths: &[PathBuf]) -> Result<Vec<ArtifactRef>, StepError> {
        paths.iter().map(|path| self.stage(path)).collect()
    }

    /// Checks that no two different local files of the step share a remote
    /// location. The same local path listed twice is allowed.
    ///
    /// # Errors
    ///
    /// Returns `StepError::ArtifactCollision` naming both local paths.
    pub fn ensure_distinct<'b>(
        &self,
        artifacts: impl IntoIterator<Item = &'b ArtifactRef>,
    ) -> Result<(), StepError> {
        let mut seen: HashMap<&str, &Path> = HashMap::new();
        for artifact in artifacts {
            match seen.get(artifact.uri.as_str()) {
                Some(first) if *first != artifact.local_path.as_path() => {
                    return Err(StepError::ArtifactCollision {
                        step: self.step.to_string(),
                        uri: artifact.uri.clone(),
                        first: first.display().to_string(),
                        second: artifact.local_path.display().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(&artifact.uri, &artifact.local_path);
                }
            }
        }
        Ok(())
    }
}
