//! Whole-pipeline builds.

use serde::Deserialize;
use tracing::{error, info, instrument};

use super::compiler::StepCompiler;
use super::config::PipelineConfig;
use super::context::EtlContext;
use super::graph::PipelineGraph;
use super::manifest::PipelineManifest;
use super::object::PipelineObject;
use crate::error::PipelineError;
use crate::step::StepDefinition;

/// Declarative description of a pipeline: its steps, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// A finalized graph with its execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPipeline {
    graph: PipelineGraph,
    order: Vec<String>,
}

impl CompiledPipeline {
    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Step names, dependencies first.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    /// Objects in execution order.
    pub fn activities(&self) -> impl Iterator<Item = &PipelineObject> {
        self.order.iter().filter_map(|name| self.graph.get(name))
    }

    pub fn into_graph(self) -> PipelineGraph {
        self.graph
    }
}

/// Compiles step definitions into a finalized pipeline.
#[derive(Debug)]
pub struct PipelineBuilder {
    ctx: EtlContext,
}

impl PipelineBuilder {
    pub fn new(ctx: EtlContext) -> Self {
        Self { ctx }
    }

    /// Creates a builder whose context comes from `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self::new(EtlContext::from_config(config)?))
    }

    pub fn context(&self) -> &EtlContext {
        &self.ctx
    }

    /// Compiles every step, then finalizes the graph.
    ///
    /// A build is all or nothing: the first failing step aborts it and no
    /// partial graph is returned.
    #[instrument(skip_all, fields(pipeline = %self.ctx.pipeline_name()))]
    pub fn build<I>(&self, definitions: I) -> Result<CompiledPipeline, PipelineError>
    where
        I: IntoIterator<Item = StepDefinition>,
    {
        let compiler = StepCompiler::new(&self.ctx);
        let mut graph = PipelineGraph::new();

        for definition in definitions {
            let name = definition.name.clone();
            if let Err(e) = compiler.compile(definition, &mut graph) {
                error!(step = %name, error = %e, "step failed to compile");
                return Err(e.into());
            }
        }

        let order = graph.finalize().map_err(|e| {
            error!(error = %e, "pipeline failed to finalize");
            e
        })?;

        info!(
            steps = graph.len(),
            artifacts = graph.staged_artifacts().len(),
            "pipeline built"
        );

        Ok(CompiledPipeline { graph, order })
    }

    /// Builds every step of a pipeline definition.
    pub fn build_definition(
        &self,
        definition: PipelineDefinition,
    ) -> Result<CompiledPipeline, PipelineError> {
        self.build(definition.steps)
    }

    /// Renders a built pipeline against this builder's context.
    pub fn manifest<'a>(&'a self, pipeline: &'a CompiledPipeline) -> PipelineManifest<'a> {
        PipelineManifest::new(&self.ctx, pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::step::StepKind;

    fn builder() -> PipelineBuilder {
        PipelineBuilder::from_config(&PipelineConfig::default()).unwrap()
    }

    fn command(name: &str) -> StepDefinition {
        StepDefinition::new(name, StepKind::ShellCommand).with_command("true")
    }

    #[test]
    fn test_build_orders_steps() {
        let pipeline = builder()
            .build(vec![
                command("load").with_input_node("extract"),
                command("extract"),
            ])
            .unwrap();

        assert_eq!(pipeline.execution_order(), ["extract", "load"]);
        assert_eq!(pipeline.graph().names(), ["load", "extract"]);
        let names: Vec<&str> = pipeline.activities().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["extract", "load"]);
    }

    #[test]
    fn test_build_aborts_on_first_step_error() {
        let result = builder().build(vec![
            command("extract"),
            StepDefinition::new("broken", StepKind::ShellCommand),
            command("load"),
        ]);

        assert!(matches!(
            result,
            Err(PipelineError::Step(StepError::AmbiguousStepDefinition { ref step, .. })) if step == "broken"
        ));
    }

    #[test]
    fn test_build_reports_finalize_errors() {
        let result = builder().build(vec![command("load").with_input_node("nowhere")]);
        assert!(matches!(result, Err(PipelineError::UnknownStep { .. })));
    }

    #[test]
    fn test_invalid_config() {
        let result = PipelineBuilder::from_config(&PipelineConfig::default().with_pipeline_name(""));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_empty_definition() {
        let pipeline = builder()
            .build_definition(PipelineDefinition::default())
            .unwrap();
        assert!(pipeline.graph().is_empty());
        assert!(pipeline.execution_order().is_empty());
    }
}
