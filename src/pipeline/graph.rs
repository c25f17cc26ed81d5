//! The pipeline object graph of one build.
//!
//! Objects are registered once, keyed by step name, and never replaced.
//! Registration order is remembered: it breaks ties when the graph is
//! finalized into an execution order.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::artifact::ArtifactRef;
use super::node::{DataNode, NodeRef, StepOutput};
use super::object::PipelineObject;
use crate::error::{PipelineError, StepError};

/// Append-only registry of compiled pipeline objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineGraph {
    objects: HashMap<String, PipelineObject>,
    order: Vec<String>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a compiled object under its step name.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateStepName` if the name is taken; the graph is not
    /// modified in that case.
    pub fn register(&mut self, object: PipelineObject) -> Result<&PipelineObject, StepError> {
        if self.objects.contains_key(&object.name) {
            return Err(StepError::DuplicateStepName(object.name));
        }

        let name = object.name.clone();
        self.order.push(name.clone());
        Ok(self.objects.entry(name).or_insert(object))
    }

    pub fn get(&self, name: &str) -> Option<&PipelineObject> {
        self.objects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Step names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PipelineObject> {
        self.order.iter().filter_map(|name| self.objects.get(name))
    }

    /// Every data node owned by a registered object, in registration order.
    pub fn data_nodes(&self) -> Vec<&DataNode> {
        self.iter().flat_map(PipelineObject::owned_nodes).collect()
    }

    /// Every staged artifact, in registration order.
    pub fn staged_artifacts(&self) -> Vec<&ArtifactRef> {
        self.iter()
            .flat_map(PipelineObject::staged_artifacts)
            .collect()
    }

    /// Resolves the node `consumer` reads through `reference`.
    ///
    /// # Errors
    ///
    /// - `UnknownStep` if the producer is not registered
    /// - `UnknownOutput` if the output key does not exist, or a key is given
    ///   for a producer without an output map
    /// - `AmbiguousInput` if no key is given for a producer with an output map
    pub fn resolve(&self, consumer: &str, reference: &NodeRef) -> Result<&DataNode, PipelineError> {
        let producer = self
            .objects
            .get(&reference.step)
            .ok_or_else(|| PipelineError::UnknownStep {
                step: consumer.to_string(),
                reference: reference.step.clone(),
            })?;

        match (producer.exposed_output(), reference.output.as_deref()) {
            (StepOutput::Single(node), None) => Ok(node),
            (StepOutput::Mapped(nodes), Some(key)) => {
                nodes.get(key).ok_or_else(|| PipelineError::UnknownOutput {
                    step: consumer.to_string(),
                    producer: reference.step.clone(),
                    output: key.to_string(),
                })
            }
            (StepOutput::Single(_), Some(key)) => Err(PipelineError::UnknownOutput {
                step: consumer.to_string(),
                producer: reference.step.clone(),
                output: key.to_string(),
            }),
            (StepOutput::Mapped(_), None) => Err(PipelineError::AmbiguousInput {
                step: consumer.to_string(),
                producer: reference.step.clone(),
            }),
        }
    }

    /// Checks every reference and returns the step names in execution order.
    ///
    /// Uses Kahn's algorithm. Ready steps are taken in registration order so
    /// the result is deterministic.
    ///
    /// # Errors
    ///
    /// Returns a resolution error from [`PipelineGraph::resolve`], an
    /// `UnknownStep` for a dangling `dependsOn` entry, or `CycleDetected`.
    pub fn finalize(&self) -> Result<Vec<String>, PipelineError> {
        let mut dag: DiGraph<&str, ()> = DiGraph::with_capacity(self.order.len(), 0);
        let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.order.len());
        for name in &self.order {
            index.insert(name.as_str(), dag.add_node(name.as_str()));
        }

        for object in self.iter() {
            if let Some(input) = &object.input_node {
                self.resolve(&object.name, input)?;
            }

            let to = index[object.name.as_str()];
            for dependency in &object.depends_on {
                let from = index.get(dependency.as_str()).copied().ok_or_else(|| {
                    PipelineError::UnknownStep {
                        step: object.name.clone(),
                        reference: dependency.clone(),
                    }
                })?;
                dag.add_edge(from, to, ());
            }
        }

        let mut in_degree: Vec<usize> = dag
            .node_indices()
            .map(|idx| dag.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        // Node indices follow registration order, so the smallest ready
        // index is the earliest registered ready step.
        let mut ready: BTreeSet<NodeIndex> = dag
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut sorted = Vec::with_capacity(dag.node_count());
        while let Some(idx) = ready.pop_first() {
            sorted.push(dag[idx].to_string());
            for next in dag.neighbors_directed(idx, Direction::Outgoing) {
                let degree = &mut in_degree[next.index()];
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(next);
                }
            }
        }

        if sorted.len() != dag.node_count() {
            let cycle = dag
                .node_indices()
                .filter(|idx| in_degree[idx.index()] > 0)
                .map(|idx| dag[idx].to_string())
                .collect();
            return Err(PipelineError::CycleDetected { cycle });
        }

        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compiler::StepCompiler;
    use crate::pipeline::config::PipelineConfig;
    use crate::pipeline::context::EtlContext;
    use crate::step::{StepDefinition, StepKind};

    fn build(definitions: Vec<StepDefinition>) -> PipelineGraph {
        let ctx = EtlContext::from_config(&PipelineConfig::default()).unwrap();
        let compiler = StepCompiler::new(&ctx);
        let mut graph = PipelineGraph::new();
        for definition in definitions {
            compiler.compile(definition, &mut graph).unwrap();
        }
        graph
    }

    fn command(name: &str) -> StepDefinition {
        StepDefinition::new(name, StepKind::ShellCommand).with_command(format!("run {}", name))
    }

    #[test]
    fn test_finalize_orders_dependencies_first() {
        // Registered out of order on purpose.
        let graph = build(vec![
            command("load").with_input_node("clean"),
            command("clean").with_input_node("extract"),
            command("extract"),
        ]);

        assert_eq!(graph.names(), ["load", "clean", "extract"]);
        assert_eq!(graph.finalize().unwrap(), vec!["extract", "clean", "load"]);
    }

    #[test]
    fn test_finalize_ties_follow_registration_order() {
        let graph = build(vec![command("b"), command("a"), command("c").with_depends_on("a")]);
        assert_eq!(graph.finalize().unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_finalize_detects_cycle() {
        let graph = build(vec![
            command("a").with_depends_on("b"),
            command("b").with_depends_on("a"),
            command("c"),
        ]);

        match graph.finalize() {
            Err(PipelineError::CycleDetected { cycle }) => {
                assert_eq!(cycle, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_finalize_unknown_dependency() {
        let graph = build(vec![command("a").with_depends_on("ghost")]);
        assert!(matches!(
            graph.finalize(),
            Err(PipelineError::UnknownStep { ref step, ref reference }) if step == "a" && reference == "ghost"
        ));
    }

    #[test]
    fn test_resolve_single_and_mapped_outputs() {
        let graph = build(vec![
            command("extract"),
            command("split").with_output("a", "pathA").with_output("b", "pathB"),
        ]);

        let node = graph.resolve("x", &NodeRef::step("extract")).unwrap();
        assert_eq!(node.id, "extract_output");

        let node = graph.resolve("x", &NodeRef::output("split", "b")).unwrap();
        assert_eq!(node.id, "split_output_b");

        assert!(matches!(
            graph.resolve("x", &NodeRef::step("split")),
            Err(PipelineError::AmbiguousInput { .. })
        ));
        assert!(matches!(
            graph.resolve("x", &NodeRef::output("split", "c")),
            Err(PipelineError::UnknownOutput { .. })
        ));
        assert!(matches!(
            graph.resolve("x", &NodeRef::output("extract", "a")),
            Err(PipelineError::UnknownOutput { .. })
        ));
        assert!(matches!(
            graph.resolve("x", &NodeRef::step("missing")),
            Err(PipelineError::UnknownStep { .. })
        ));
    }

    #[test]
    fn test_finalize_rejects_bad_input_reference() {
        let graph = build(vec![
            command("split").with_output("a", "pathA"),
            command("load").with_input_node("split"),
        ]);
        assert!(matches!(
            graph.finalize(),
            Err(PipelineError::AmbiguousInput { ref step, .. }) if step == "load"
        ));
    }

    #[test]
    fn test_data_nodes_and_artifacts() {
        let graph = build(vec![
            StepDefinition::new("clean", StepKind::ShellCommand)
                .with_script("scripts/clean.sh")
                .with_additional_file("lib/common.sh"),
            command("split").with_output("a", "pathA"),
        ]);

        let ids: Vec<&str> = graph.data_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["clean_output", "split_output", "split_output_a"]);

        let uris: Vec<&str> = graph
            .staged_artifacts()
            .iter()
            .map(|a| a.uri.as_str())
            .collect();
        assert_eq!(
            uris,
            vec![
                "s3://etl-bucket/src/etl_pipeline/clean/clean.sh",
                "s3://etl-bucket/src/etl_pipeline/clean/common.sh"
            ]
        );
    }

    #[test]
    fn test_empty_graph_finalizes() {
        let graph = PipelineGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.finalize().unwrap(), Vec::<String>::new());
    }
}
