//! ductforge: compiles declarative ETL steps into data pipeline objects.
//!
//! Steps are validated, bound to data nodes, staged artifacts, a compute
//! resource and a schedule, then ordered by their dependencies.

pub mod error;
pub mod pipeline;
pub mod step;

pub use error::{PipelineError, StepError};
pub use pipeline::{CompiledPipeline, EtlContext, PipelineBuilder, PipelineConfig};
pub use step::{Step, StepDefinition, StepKind};
