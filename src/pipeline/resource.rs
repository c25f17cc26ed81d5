//! Compute resources and resource selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::EtlContext;
use crate::error::StepError;

/// Kinds of compute resource an activity can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A single EC2-like instance; the default.
    Ec2,
    /// An EMR-like cluster.
    Emr,
}

impl ResourceKind {
    /// Maps a declared resource type onto a kind.
    ///
    /// `emr` and `emr_cluster` (any case) select the cluster. Every other
    /// value selects the default instance.
    pub fn from_type_name(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("emr") || name.eq_ignore_ascii_case("emr_cluster") {
            ResourceKind::Emr
        } else {
            ResourceKind::Ec2
        }
    }

    /// Object type name used by the execution service.
    pub fn object_type(&self) -> &'static str {
        match self {
            ResourceKind::Ec2 => "Ec2Resource",
            ResourceKind::Emr => "EmrCluster",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Ec2 => write!(f, "ec2"),
            ResourceKind::Emr => write!(f, "emr"),
        }
    }
}

/// A compute resource registered on the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Object id referenced by activities.
    pub id: String,
    /// Object type name, derived from the kind.
    #[serde(rename = "type")]
    pub object_type: &'static str,
    #[serde(skip)]
    pub kind: ResourceKind,
    /// Instance type (the master instance type for clusters).
    pub instance_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_instance_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_instance_count: Option<u32>,
    pub terminate_after: String,
}

impl Resource {
    /// Creates an EC2-like instance resource.
    pub fn ec2(
        id: impl Into<String>,
        instance_type: impl Into<String>,
        terminate_after: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object_type: ResourceKind::Ec2.object_type(),
            kind: ResourceKind::Ec2,
            instance_type: instance_type.into(),
            core_instance_type: None,
            core_instance_count: None,
            terminate_after: terminate_after.into(),
        }
    }

    /// Creates an EMR-like cluster resource.
    pub fn emr(
        id: impl Into<String>,
        master_instance_type: impl Into<String>,
        core_instance_type: impl Into<String>,
        core_instance_count: u32,
        terminate_after: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object_type: ResourceKind::Emr.object_type(),
            kind: ResourceKind::Emr,
            instance_type: master_instance_type.into(),
            core_instance_type: Some(core_instance_type.into()),
            core_instance_count: Some(core_instance_count),
            terminate_after: terminate_after.into(),
        }
    }
}

/// Selects the resource a step runs on.
///
/// `requested` is the step's override; without one the step kind's default
/// applies.
///
/// # Errors
///
/// Returns `StepError::UnknownResourceContext` if the resolved kind is not
/// registered on the pipeline.
pub fn select<'a>(
    step: &str,
    requested: Option<ResourceKind>,
    default: ResourceKind,
    ctx: &'a EtlContext,
) -> Result<&'a Resource, StepError> {
    let kind = requested.unwrap_or(default);
    ctx.resource(kind)
        .ok_or_else(|| StepError::UnknownResourceContext {
            step: step.to_string(),
            resource: kind,
        })
}
