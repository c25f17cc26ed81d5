//! Compiled pipeline objects.

use std::collections::BTreeSet;

use serde::Serialize;

use super::artifact::ArtifactRef;
use super::node::{DataNode, NodeRef, StepOutput};
use super::resource::ResourceKind;

/// Activity types emitted for the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityKind {
    ShellCommandActivity,
    SqlActivity,
}

/// What the activity runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActivityAction {
    #[serde(rename = "command")]
    Command(String),
    #[serde(rename = "scriptUri")]
    Script(ArtifactRef),
}

/// A compiled step: one activity with its nodes, resource, and dependencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineObject {
    /// Step name; also the object id of the activity.
    pub name: String,
    pub activity_kind: ActivityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_node: Option<NodeRef>,
    /// Node the activity writes to. Shadowed by `output_nodes` for mapped steps.
    pub base_output_node: DataNode,
    /// Output exposed to downstream steps.
    pub output_nodes: StepOutput,
    /// Object id of the resource the activity runs on.
    pub resource: String,
    pub resource_kind: ResourceKind,
    /// Object id of the schedule.
    pub schedule: String,
    #[serde(flatten)]
    pub action: ActivityAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_arguments: Option<Vec<String>>,
    #[serde(rename = "additionalS3Files", skip_serializing_if = "Vec::is_empty")]
    pub additional_s3_files: Vec<ArtifactRef>,
    pub max_retries: u32,
    /// Steps this activity waits for.
    pub depends_on: BTreeSet<String>,
}

impl PipelineObject {
    /// Output downstream steps read from.
    pub fn exposed_output(&self) -> &StepOutput {
        &self.output_nodes
    }

    /// The staged script, if the activity runs one.
    pub fn script(&self) -> Option<&ArtifactRef> {
        match &self.action {
            ActivityAction::Script(artifact) => Some(artifact),
            ActivityAction::Command(_) => None,
        }
    }

    /// Every artifact the activity needs staged: the script first, then the
    /// additional files.
    pub fn staged_artifacts(&self) -> impl Iterator<Item = &ArtifactRef> {
        self.script().into_iter().chain(self.additional_s3_files.iter())
    }

    /// Data nodes owned by this object: the base node, then mapped nodes.
    pub fn owned_nodes(&self) -> Vec<&DataNode> {
        let mut nodes = vec![&self.base_output_node];
        if self.output_nodes.is_mapped() {
            nodes.extend(self.output_nodes.nodes());
        }
        nodes
    }
}
