//! Serializable view of a built pipeline.
//!
//! The manifest is what an external uploader or execution service consumes:
//! the schedule, the resources, every data node, the activities in execution
//! order, and the list of files to stage.

use std::path::Path;

use serde::Serialize;

use super::builder::CompiledPipeline;
use super::context::{EtlContext, Schedule};
use super::node::DataNode;
use super::object::PipelineObject;
use super::resource::Resource;
use crate::error::PipelineError;

/// A local file and the remote location it must be uploaded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedArtifact<'a> {
    pub local_path: &'a Path,
    pub uri: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineManifest<'a> {
    pub pipeline: &'a str,
    pub schedule: &'a Schedule,
    pub resources: Vec<&'a Resource>,
    pub data_nodes: Vec<&'a DataNode>,
    pub activities: Vec<&'a PipelineObject>,
    pub staged_artifacts: Vec<StagedArtifact<'a>>,
}

impl<'a> PipelineManifest<'a> {
    pub fn new(ctx: &'a EtlContext, pipeline: &'a CompiledPipeline) -> Self {
        let graph = pipeline.graph();
        Self {
            pipeline: ctx.pipeline_name(),
            schedule: ctx.schedule(),
            resources: ctx.resources(),
            data_nodes: graph.data_nodes(),
            activities: pipeline.activities().collect(),
            staged_artifacts: graph
                .staged_artifacts()
                .into_iter()
                .map(|artifact| StagedArtifact {
                    local_path: &artifact.local_path,
                    uri: &artifact.uri,
                })
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, PipelineError> {
        Ok(serde_json::to_value(self)?)
    }
}
