//! Data nodes and output derivation.
//!
//! Every compiled step owns a base output node. Steps with an output map also
//! own one derived node per entry, placed below the base node; those derived
//! nodes are what downstream steps see. Consumers never hold a node, only a
//! [`NodeRef`] naming the producing step and, for mapped producers, the
//! output key.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::naming::{as_directory, join_uri, PipelineNaming};
use crate::error::StepError;

/// A location an activity reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataNode {
    /// Object id of the node.
    pub id: String,
    /// Directory the node points at; always ends in `/`.
    pub directory_path: String,
    /// Step that owns the node.
    pub producer: String,
    /// Base node a mapped node was derived from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Reference from a consumer to a producer's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawNodeRef", rename_all = "camelCase")]
pub struct NodeRef {
    /// Producing step.
    pub step: String,
    /// Output key, required when the producer exposes an output map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl NodeRef {
    /// References the sole output of `step`.
    pub fn step(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            output: None,
        }
    }

    /// References the output named `output` of `step`.
    pub fn output(step: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            output: Some(output.into()),
        }
    }
}

/// Accepted spellings: `"step"` or `{step, output}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNodeRef {
    Step(String),
    Output {
        step: String,
        #[serde(default)]
        output: Option<String>,
    },
}

impl From<RawNodeRef> for NodeRef {
    fn from(raw: RawNodeRef) -> Self {
        match raw {
            RawNodeRef::Step(step) => NodeRef { step, output: None },
            RawNodeRef::Output { step, output } => NodeRef { step, output },
        }
    }
}

/// Output a step exposes to its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StepOutput {
    Single(DataNode),
    Mapped(BTreeMap<String, DataNode>),
}

impl StepOutput {
    pub fn is_mapped(&self) -> bool {
        matches!(self, StepOutput::Mapped(_))
    }

    /// Returns the single node, if the output is not mapped.
    pub fn single(&self) -> Option<&DataNode> {
        match self {
            StepOutput::Single(node) => Some(node),
            StepOutput::Mapped(_) => None,
        }
    }

    /// Returns the node exposed under `key`, if the output is mapped.
    pub fn get(&self, key: &str) -> Option<&DataNode> {
        match self {
            StepOutput::Single(_) => None,
            StepOutput::Mapped(nodes) => nodes.get(key),
        }
    }

    /// All exposed nodes, mapped nodes in key order.
    pub fn nodes(&self) -> Vec<&DataNode> {
        match self {
            StepOutput::Single(node) => vec![node],
            StepOutput::Mapped(nodes) => nodes.values().collect(),
        }
    }
}

/// Builds the output nodes of one step.
#[derive(Debug, Clone, Copy)]
pub struct OutputNodeBuilder<'a> {
    naming: &'a dyn PipelineNaming,
    pipeline: &'a str,
    step: &'a str,
}

impl<'a> OutputNodeBuilder<'a> {
    pub fn new(naming: &'a dyn PipelineNaming, pipeline: &'a str, step: &'a str) -> Self {
        Self {
            naming,
            pipeline,
            step,
        }
    }

    /// Builds the base output node, at `path_override` or the default path.
    pub fn build_base(&self, path_override: Option<&str>) -> DataNode {
        let directory_path = match path_override {
            Some(path) => as_directory(path),
            None => self.naming.default_output_path(self.pipeline, self.step),
        };

        DataNode {
            id: format!("{}_output", self.step),
            directory_path,
            producer: self.step.to_string(),
            parent: None,
        }
    }

    /// Derives one node per output map entry, keyed like the map.
    ///
    /// Relative entries are placed below the base node; entries that are
    /// already URIs (`scheme://...`) are used as given.
    pub fn build_mapped(
        &self,
        base: &DataNode,
        output_map: &BTreeMap<String, String>,
    ) -> BTreeMap<String, DataNode> {
        output_map
            .iter()
            .map(|(key, path)| {
                let directory_path = if path.contains("://") {
                    as_directory(path)
                } else {
                    as_directory(&join_uri(&base.directory_path, path))
                };
                let node = DataNode {
                    id: format!("{}_output_{}", self.step, key),
                    directory_path,
                    producer: self.step.to_string(),
                    parent: Some(base.id.clone()),
                };
                (key.clone(), node)
            })
            .collect()
    }

    /// Output exposed to consumers: the mapped nodes if a map is given,
    /// otherwise the base node itself.
    ///
    /// # Errors
    ///
    /// Returns `StepError::InvalidOutputMap` if a mapped node points at the
    /// base directory or at the same directory as another mapped node.
    pub fn build_output(
        &self,
        base: &DataNode,
        output_map: Option<&BTreeMap<String, String>>,
    ) -> Result<StepOutput, StepError> {
        let Some(map) = output_map else {
            return Ok(StepOutput::Single(base.clone()));
        };

        let nodes = self.build_mapped(base, map);
        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for (key, node) in &nodes {
            if node.directory_path == base.directory_path {
                return Err(self.output_map_error(format!(
                    "output '{}' resolves to the base directory '{}'",
                    key, base.directory_path
                )));
            }
            if let Some(other) = claimed.insert(&node.directory_path, key) {
                return Err(self.output_map_error(format!(
                    "outputs '{}' and '{}' both resolve to '{}'",
                    other, key, node.directory_path
                )));
            }
        }

        Ok(StepOutput::Mapped(nodes))
    }

    fn output_map_error(&self, message: String) -> StepError {
        StepError::InvalidOutputMap {
            step: self.step.to_string(),
            message,
        }
    }
}
