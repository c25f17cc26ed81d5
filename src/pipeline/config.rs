//! Pipeline configuration for the step compiler.
//!
//! This module provides the pipeline-wide settings the compiler reads:
//! naming roots for data and staged artifacts, the retry policy attached to
//! every activity, the schedule, and the compute resources registered on the
//! pipeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::step::is_valid_name;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for a single pipeline build.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Naming settings
    /// Name of the pipeline; used when deriving default paths.
    pub pipeline_name: String,
    /// Root URI under which default step outputs are placed.
    pub output_root: String,
    /// Root URI under which scripts and additional files are staged.
    pub artifact_root: String,

    // Execution policy
    /// Retry budget attached to every compiled activity.
    pub max_retries: u32,
    /// Schedule period, in the execution service's notation (e.g. "1 day").
    pub schedule_period: String,
    /// Fixed schedule start; `None` starts on first activation.
    pub schedule_start: Option<DateTime<Utc>>,

    // Resource settings
    /// Instance type of the default EC2-like resource.
    pub ec2_instance_type: String,
    /// Whether an EMR-like cluster is registered on the pipeline.
    pub enable_emr: bool,
    /// Master instance type of the EMR-like cluster.
    pub emr_master_instance_type: String,
    /// Core instance type of the EMR-like cluster.
    pub emr_core_instance_type: String,
    /// Number of core instances of the EMR-like cluster.
    pub emr_core_instance_count: u32,
    /// Lifetime after which resources are terminated (e.g. "6 Hours").
    pub terminate_after: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: "etl_pipeline".to_string(),
            output_root: "s3://etl-bucket/data".to_string(),
            artifact_root: "s3://etl-bucket/src".to_string(),

            max_retries: 0,
            schedule_period: "1 day".to_string(),
            schedule_start: None,

            ec2_instance_type: "m1.large".to_string(),
            enable_emr: false,
            emr_master_instance_type: "m1.large".to_string(),
            emr_core_instance_type: "m1.large".to_string(),
            emr_core_instance_count: 1,
            terminate_after: "6 Hours".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ETL_PIPELINE_NAME`: Pipeline name (default: etl_pipeline)
    /// - `ETL_OUTPUT_ROOT`: Root URI for step outputs (default: s3://etl-bucket/data)
    /// - `ETL_ARTIFACT_ROOT`: Root URI for staged artifacts (default: s3://etl-bucket/src)
    /// - `ETL_MAX_RETRIES`: Retry budget per activity (default: 0)
    /// - `ETL_SCHEDULE_PERIOD`: Schedule period (default: 1 day)
    /// - `ETL_SCHEDULE_START`: RFC 3339 schedule start (default: first activation)
    /// - `ETL_EC2_INSTANCE_TYPE`: EC2 instance type (default: m1.large)
    /// - `ETL_ENABLE_EMR`: Register an EMR cluster (default: false)
    /// - `ETL_EMR_MASTER_INSTANCE_TYPE`: EMR master type (default: m1.large)
    /// - `ETL_EMR_CORE_INSTANCE_TYPE`: EMR core type (default: m1.large)
    /// - `ETL_EMR_CORE_INSTANCE_COUNT`: EMR core count (default: 1)
    /// - `ETL_TERMINATE_AFTER`: Resource lifetime (default: 6 Hours)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Naming settings
        if let Ok(val) = std::env::var("ETL_PIPELINE_NAME") {
            config.pipeline_name = val;
        }

        if let Ok(val) = std::env::var("ETL_OUTPUT_ROOT") {
            config.output_root = val;
        }

        if let Ok(val) = std::env::var("ETL_ARTIFACT_ROOT") {
            config.artifact_root = val;
        }

        // Execution policy
        if let Ok(val) = std::env::var("ETL_MAX_RETRIES") {
            config.max_retries = parse_env_value(&val, "ETL_MAX_RETRIES")?;
        }

        if let Ok(val) = std::env::var("ETL_SCHEDULE_PERIOD") {
            config.schedule_period = val;
        }

        if let Ok(val) = std::env::var("ETL_SCHEDULE_START") {
            config.schedule_start = Some(parse_env_timestamp(&val, "ETL_SCHEDULE_START")?);
        }

        // Resource settings
        if let Ok(val) = std::env::var("ETL_EC2_INSTANCE_TYPE") {
            config.ec2_instance_type = val;
        }

        if let Ok(val) = std::env::var("ETL_ENABLE_EMR") {
            config.enable_emr = parse_env_bool(&val, "ETL_ENABLE_EMR")?;
        }

        if let Ok(val) = std::env::var("ETL_EMR_MASTER_INSTANCE_TYPE") {
            config.emr_master_instance_type = val;
        }

        if let Ok(val) = std::env::var("ETL_EMR_CORE_INSTANCE_TYPE") {
            config.emr_core_instance_type = val;
        }

        if let Ok(val) = std::env::var("ETL_EMR_CORE_INSTANCE_COUNT") {
            config.emr_core_instance_count = parse_env_value(&val, "ETL_EMR_CORE_INSTANCE_COUNT")?;
        }

        if let Ok(val) = std::env::var("ETL_TERMINATE_AFTER") {
            config.terminate_after = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Naming validation
        if !is_valid_name(&self.pipeline_name) {
            return Err(ConfigError::ValidationFailed(format!(
                "pipeline_name '{}' must be non-empty and contain only alphanumeric characters, hyphens, and underscores",
                self.pipeline_name
            )));
        }

        validate_root(&self.output_root, "output_root")?;
        validate_root(&self.artifact_root, "artifact_root")?;

        // Policy validation
        if self.schedule_period.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "schedule_period cannot be empty".to_string(),
            ));
        }

        // Resource validation
        if self.ec2_instance_type.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "ec2_instance_type cannot be empty".to_string(),
            ));
        }

        if self.terminate_after.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "terminate_after cannot be empty".to_string(),
            ));
        }

        if self.enable_emr {
            if self.emr_master_instance_type.is_empty() || self.emr_core_instance_type.is_empty()
            {
                return Err(ConfigError::ValidationFailed(
                    "emr instance types cannot be empty when EMR is enabled".to_string(),
                ));
            }

            if self.emr_core_instance_count == 0 {
                return Err(ConfigError::ValidationFailed(
                    "emr_core_instance_count must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Builder method to set the pipeline name.
    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = name.into();
        self
    }

    /// Builder method to set the output root.
    pub fn with_output_root(mut self, root: impl Into<String>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Builder method to set the artifact root.
    pub fn with_artifact_root(mut self, root: impl Into<String>) -> Self {
        self.artifact_root = root.into();
        self
    }

    /// Builder method to set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builder method to set the schedule period.
    pub fn with_schedule_period(mut self, period: impl Into<String>) -> Self {
        self.schedule_period = period.into();
        self
    }

    /// Builder method to set a fixed schedule start.
    pub fn with_schedule_start(mut self, start: DateTime<Utc>) -> Self {
        self.schedule_start = Some(start);
        self
    }

    /// Builder method to set the EC2 instance type.
    pub fn with_ec2_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.ec2_instance_type = instance_type.into();
        self
    }

    /// Builder method to enable or disable the EMR cluster.
    pub fn with_emr(mut self, enabled: bool) -> Self {
        self.enable_emr = enabled;
        self
    }

    /// Builder method to set the EMR core instance count.
    pub fn with_emr_core_instance_count(mut self, count: u32) -> Self {
        self.emr_core_instance_count = count;
        self
    }

    /// Builder method to set the resource lifetime.
    pub fn with_terminate_after(mut self, lifetime: impl Into<String>) -> Self {
        self.terminate_after = lifetime.into();
        self
    }
}

/// Checks that a root is a non-empty URI with a scheme.
fn validate_root(root: &str, field: &str) -> Result<(), ConfigError> {
    match root.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() && !rest.trim_matches('/').is_empty() => Ok(()),
        _ => Err(ConfigError::ValidationFailed(format!(
            "{} '{}' must be a URI such as s3://bucket/prefix",
            field, root
        ))),
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

/// Parse an environment variable as an RFC 3339 timestamp.
fn parse_env_timestamp(value: &str, key: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected RFC 3339 timestamp, got '{}': {}", value, e),
        })
}
