//! Per-build execution context.
//!
//! An [`EtlContext`] carries everything a step needs from its enclosing
//! pipeline: the pipeline name, the retry policy, the schedule, the
//! registered compute resources, and the naming conventions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::{ConfigError, PipelineConfig};
use super::naming::{PipelineNaming, S3Naming};
use super::resource::{Resource, ResourceKind};

/// Object id of the pipeline schedule.
const SCHEDULE_ID: &str = "DefaultSchedule";

/// Object id of the default EC2-like resource.
const EC2_RESOURCE_ID: &str = "Ec2Resource";

/// Object id of the EMR-like cluster.
const EMR_CLUSTER_ID: &str = "EmrCluster";

/// Schedule every activity of the pipeline is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub period: String,
    /// Fixed start; `None` starts on the pipeline's first activation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn starts_on_first_activation(&self) -> bool {
        self.start_date_time.is_none()
    }
}

/// Context shared by every step compiled in one build.
#[derive(Debug)]
pub struct EtlContext {
    pipeline_name: String,
    max_retries: u32,
    schedule: Schedule,
    resources: HashMap<ResourceKind, Resource>,
    naming: Box<dyn PipelineNaming>,
}

impl EtlContext {
    /// Creates a context from a pipeline configuration.
    ///
    /// The EC2-like resource is always registered; the EMR-like cluster only
    /// when the configuration enables it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut resources = HashMap::new();
        resources.insert(
            ResourceKind::Ec2,
            Resource::ec2(
                EC2_RESOURCE_ID,
                &config.ec2_instance_type,
                &config.terminate_after,
            ),
        );
        if config.enable_emr {
            resources.insert(
                ResourceKind::Emr,
                Resource::emr(
                    EMR_CLUSTER_ID,
                    &config.emr_master_instance_type,
                    &config.emr_core_instance_type,
                    config.emr_core_instance_count,
                    &config.terminate_after,
                ),
            );
        }

        Ok(Self {
            pipeline_name: config.pipeline_name.clone(),
            max_retries: config.max_retries,
            schedule: Schedule {
                id: SCHEDULE_ID.to_string(),
                period: config.schedule_period.clone(),
                start_date_time: config.schedule_start,
            },
            resources,
            naming: Box::new(S3Naming::new(&config.output_root, &config.artifact_root)),
        })
    }

    /// Replaces the naming conventions.
    pub fn with_naming(mut self, naming: impl PipelineNaming + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    /// Registers a resource, replacing any resource of the same kind.
    ///
    /// Returns the replaced resource.
    pub fn register_resource(&mut self, resource: Resource) -> Option<Resource> {
        self.resources.insert(resource.kind, resource)
    }

    /// Removes the resource of `kind`, if registered.
    pub fn unregister_resource(&mut self, kind: ResourceKind) -> Option<Resource> {
        self.resources.remove(&kind)
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&Resource> {
        self.resources.get(&kind)
    }

    /// Registered resources, ordered by kind.
    pub fn resources(&self) -> Vec<&Resource> {
        let mut resources: Vec<&Resource> = self.resources.values().collect();
        resources.sort_by_key(|resource| resource.kind);
        resources
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn naming(&self) -> &dyn PipelineNaming {
        self.naming.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug)]
    struct FlatNaming;

    impl PipelineNaming for FlatNaming {
        fn default_output_path(&self, _pipeline: &str, step: &str) -> String {
            format!("file:///tmp/{}/", step)
        }

        fn artifact_uri(&self, _pipeline: &str, _step: &str, file_name: &str) -> String {
            format!("file:///tmp/src/{}", file_name)
        }
    }

    #[test]
    fn test_from_default_config() {
        let ctx = EtlContext::from_config(&PipelineConfig::default()).unwrap();

        assert_eq!(ctx.pipeline_name(), "etl_pipeline");
        assert_eq!(ctx.max_retries(), 0);
        assert!(ctx.schedule().starts_on_first_activation());
        assert_eq!(ctx.schedule().period, "1 day");
        assert!(ctx.resource(ResourceKind::Ec2).is_some());
        assert!(ctx.resource(ResourceKind::Emr).is_none());
    }

    #[test]
    fn test_emr_registered_when_enabled() {
        let ctx = EtlContext::from_config(&PipelineConfig::default().with_emr(true)).unwrap();
        let emr = ctx.resource(ResourceKind::Emr).expect("emr should be registered");
        assert_eq!(emr.id, "EmrCluster");
        assert_eq!(
            ctx.resources().iter().map(|r| r.kind).collect::<Vec<_>>(),
            vec![ResourceKind::Ec2, ResourceKind::Emr]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = EtlContext::from_config(&PipelineConfig::default().with_output_root(""));
        assert!(matches!(result, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_register_and_unregister_resource() {
        let mut ctx = EtlContext::from_config(&PipelineConfig::default()).unwrap();

        let previous = ctx.register_resource(Resource::ec2("BigBox", "m5.4xlarge", "1 Hour"));
        assert_eq!(previous.map(|r| r.id), Some("Ec2Resource".to_string()));
        assert_eq!(ctx.resource(ResourceKind::Ec2).unwrap().id, "BigBox");

        ctx.unregister_resource(ResourceKind::Ec2);
        assert!(ctx.resource(ResourceKind::Ec2).is_none());
    }

    #[test]
    fn test_custom_naming() {
        let ctx = EtlContext::from_config(&PipelineConfig::default())
            .unwrap()
            .with_naming(FlatNaming);
        assert_eq!(
            ctx.naming().default_output_path("any", "clean"),
            "file:///tmp/clean/"
        );
    }

    #[test]
    fn test_schedule_with_fixed_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        let ctx =
            EtlContext::from_config(&PipelineConfig::default().with_schedule_start(start)).unwrap();
        assert!(!ctx.schedule().starts_on_first_activation());

        let value = serde_json::to_value(ctx.schedule()).unwrap();
        assert_eq!(value["startDateTime"], "2024-01-01T03:00:00Z");
        assert_eq!(value["id"], "DefaultSchedule");
    }
}
