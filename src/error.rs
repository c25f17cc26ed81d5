//! Error types for ductforge operations.
//!
//! Defines error types for the major subsystems:
//! - Step validation and compilation
//! - Pipeline graph finalization
//!
//! Configuration errors live next to the configuration they describe in
//! [`crate::pipeline::ConfigError`].

use thiserror::Error;

use crate::pipeline::config::ConfigError;
use crate::pipeline::resource::ResourceKind;

/// Errors raised while validating or compiling a single step.
///
/// Every variant is fatal for the pipeline build that produced it.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Step '{step}' must declare exactly one of 'command' or 'script' ({found})")]
    AmbiguousStepDefinition { step: String, found: String },

    #[error("Invalid script arguments for step '{step}': {message}")]
    InvalidArgumentShape { step: String, message: String },

    #[error("Step '{step}' has no usable artifact path: {message}")]
    MissingArtifact { step: String, message: String },

    #[error("Step '{step}' stages '{first}' and '{second}' to the same location '{uri}'")]
    ArtifactCollision {
        step: String,
        uri: String,
        first: String,
        second: String,
    },

    #[error("Invalid output map for step '{step}': {message}")]
    InvalidOutputMap { step: String, message: String },

    #[error("Step '{step}' requested resource '{resource}', which is not registered on the pipeline")]
    UnknownResourceContext { step: String, resource: ResourceKind },

    #[error("Step '{0}' is already registered in the pipeline graph")]
    DuplicateStepName(String),

    #[error("Invalid step name '{0}': must be non-empty and contain only alphanumeric characters, hyphens, and underscores")]
    InvalidStepName(String),

    #[error("Step '{0}' cannot depend on itself")]
    SelfDependency(String),
}

/// Errors raised while building or finalizing a whole pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Step '{step}' references unknown step '{reference}'")]
    UnknownStep { step: String, reference: String },

    #[error("Step '{step}' references output '{output}' which step '{producer}' does not expose")]
    UnknownOutput {
        step: String,
        producer: String,
        output: String,
    },

    #[error("Step '{step}' reads from '{producer}', which exposes several outputs; name one of them")]
    AmbiguousInput { step: String, producer: String },

    #[error("Dependency cycle detected involving: {}", cycle.join(", "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
