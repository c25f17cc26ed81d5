//! Step compilation.
//!
//! The [`StepCompiler`] turns one step into one [`PipelineObject`] and
//! registers it into the build's [`PipelineGraph`]:
//!
//! 1. **Validate**: the definition becomes a [`Step`] (exactly one of
//!    command or script, parsed arguments).
//! 2. **Base output**: the base node is built from the output path override
//!    or the default location.
//! 3. **Stage**: a script and any additional files get remote references.
//! 4. **Arguments**: script arguments are rendered as tokens.
//! 5. **Resource**: the step's override, or its kind's default.
//! 6. **Assemble**: the activity is bound to its nodes, resource, schedule,
//!    retry budget, and dependency set.
//! 7. **Outputs**: an output map replaces the base node as the exposed output.
//! 8. **Register**: the object is added under the step's name.
//!
//! Steps may be compiled in any order. Input nodes are recorded as
//! references and resolved when the graph is finalized.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::artifact::ArtifactStager;
use super::context::EtlContext;
use super::graph::PipelineGraph;
use super::node::OutputNodeBuilder;
use super::object::{ActivityAction, PipelineObject};
use super::resource;
use crate::error::StepError;
use crate::step::{arguments, Step, StepAction, StepDefinition};

/// Compiles steps against one execution context.
#[derive(Debug, Clone, Copy)]
pub struct StepCompiler<'a> {
    ctx: &'a EtlContext,
}

impl<'a> StepCompiler<'a> {
    pub fn new(ctx: &'a EtlContext) -> Self {
        Self { ctx }
    }

    /// Validates, compiles, and registers a declared step.
    ///
    /// # Errors
    ///
    /// Returns the first `StepError` hit; the graph is left untouched.
    pub fn compile<'g>(
        &self,
        definition: StepDefinition,
        graph: &'g mut PipelineGraph,
    ) -> Result<&'g PipelineObject, StepError> {
        let step = Step::try_from(definition)?;
        debug!(step = %step.name(), kind = %step.kind(), "step validated");
        self.compile_step(&step, graph)
    }

    /// Compiles and registers an already validated step.
    ///
    /// # Errors
    ///
    /// Returns the first `StepError` hit; the graph is left untouched.
    pub fn compile_step<'g>(
        &self,
        step: &Step,
        graph: &'g mut PipelineGraph,
    ) -> Result<&'g PipelineObject, StepError> {
        let object = self.assemble(step)?;
        debug!(step = %step.name(), "step compiled");

        let object = graph.register(object)?;
        info!(
            step = %object.name,
            activity = ?object.activity_kind,
            resource = %object.resource,
            depends_on = object.depends_on.len(),
            "registered pipeline object"
        );
        Ok(object)
    }

    /// Builds the pipeline object for `step` without registering it.
    pub fn assemble(&self, step: &Step) -> Result<PipelineObject, StepError> {
        let ctx = self.ctx;
        let name = step.name();
        let nodes = OutputNodeBuilder::new(ctx.naming(), ctx.pipeline_name(), name);
        let stager = ArtifactStager::new(ctx.naming(), ctx.pipeline_name(), name);

        let base_output_node = nodes.build_base(step.output_path());

        let action = match step.action() {
            StepAction::Script(path) => ActivityAction::Script(stager.stage(path)?),
            StepAction::Command(command) => ActivityAction::Command(command.clone()),
        };
        let additional_s3_files = stager.stage_all(step.additional_files())?;
        let script = match &action {
            ActivityAction::Script(artifact) => Some(artifact),
            ActivityAction::Command(_) => None,
        };
        stager.ensure_distinct(script.into_iter().chain(&additional_s3_files))?;

        let script_arguments = arguments::translate(step.script_arguments());

        let resource = resource::select(
            name,
            step.resource_type(),
            step.kind().default_resource(),
            ctx,
        )?;

        let mut depends_on: BTreeSet<String> = step.depends_on().iter().cloned().collect();
        if let Some(input) = step.input_node() {
            depends_on.insert(input.step.clone());
        }

        let output_nodes = nodes.build_output(&base_output_node, step.output_map())?;

        Ok(PipelineObject {
            name: name.to_string(),
            activity_kind: step.kind().activity_kind(),
            input_node: step.input_node().cloned(),
            base_output_node,
            output_nodes,
            resource: resource.id.clone(),
            resource_kind: resource.kind,
            schedule: ctx.schedule().id.clone(),
            action,
            script_arguments,
            additional_s3_files,
            max_retries: ctx.max_retries(),
            depends_on,
        })
    }
}
