//! Pipeline compilation.
//!
//! This module turns declared steps into a graph of pipeline objects ready
//! for an external execution service.
//!
//! # Architecture
//!
//! - **Config**: pipeline-wide settings, from code or `ETL_*` variables
//! - **Context**: schedule, resources, retry policy, and naming for one build
//! - **Compiler**: compiles one step into one object
//! - **Graph**: registers objects, resolves inputs, and orders execution
//! - **Builder**: compiles a whole pipeline, all or nothing
//! - **Manifest**: the serializable result
//!
//! # Example
//!
//! ```rust,ignore
//! use ductforge::pipeline::{PipelineBuilder, PipelineConfig};
//! use ductforge::step::{StepDefinition, StepKind};
//!
//! let builder = PipelineBuilder::from_config(
//!     &PipelineConfig::new()
//!         .with_pipeline_name("nightly")
//!         .with_output_root("s3://warehouse/data"),
//! )?;
//!
//! let pipeline = builder.build(vec![
//!     StepDefinition::new("extract", StepKind::ShellCommand).with_script("scripts/extract.sh"),
//!     StepDefinition::new("load", StepKind::Sql)
//!         .with_command("COPY events FROM staging")
//!         .with_input_node("extract"),
//! ])?;
//!
//! println!("{}", builder.manifest(&pipeline).to_json_pretty()?);
//! ```

pub mod artifact;
pub mod builder;
pub mod compiler;
pub mod config;
pub mod context;
pub mod graph;
pub mod manifest;
pub mod naming;
pub mod node;
pub mod object;
pub mod resource;

pub use artifact::{ArtifactRef, ArtifactStager};
pub use builder::{CompiledPipeline, PipelineBuilder, PipelineDefinition};
pub use compiler::StepCompiler;
pub use config::{ConfigError, PipelineConfig};
pub use context::{EtlContext, Schedule};
pub use graph::PipelineGraph;
pub use manifest::{PipelineManifest, StagedArtifact};
pub use naming::{PipelineNaming, S3Naming};
pub use node::{DataNode, NodeRef, OutputNodeBuilder, StepOutput};
pub use object::{ActivityAction, ActivityKind, PipelineObject};
pub use resource::{Resource, ResourceKind};
