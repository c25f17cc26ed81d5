//! Step definitions and validation.
//!
//! A step enters the compiler as a [`StepDefinition`], the shape produced by
//! whatever loads the pipeline description. Converting it into a [`Step`]
//! validates it: a `Step` always carries exactly one of a command or a
//! script, a well-formed name, and parsed script arguments.
//!
//! # Example
//!
//! ```ignore
//! use ductforge::step::{Step, StepDefinition, StepKind};
//!
//! let definition = StepDefinition::new("clean_events", StepKind::ShellCommand)
//!     .with_script("scripts/clean.py")
//!     .with_input_node("extract_events");
//!
//! let step = Step::try_from(definition)?;
//! assert!(step.action().is_script());
//! ```

pub mod arguments;

pub use arguments::{format_key_value, translate, Argument, ArgumentType, ScriptArguments};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StepError;
use crate::pipeline::node::NodeRef;
use crate::pipeline::object::ActivityKind;
use crate::pipeline::resource::ResourceKind;

/// Kinds of steps the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Runs a shell command or a staged script.
    #[default]
    #[serde(alias = "transform", alias = "ShellCommand")]
    ShellCommand,
    /// Runs SQL, inline or from a staged script.
    #[serde(alias = "sql_command", alias = "Sql")]
    Sql,
}

impl StepKind {
    /// Resource a step of this kind runs on when it does not ask for one.
    pub fn default_resource(&self) -> ResourceKind {
        match self {
            StepKind::ShellCommand | StepKind::Sql => ResourceKind::Ec2,
        }
    }

    /// Activity type the compiled object is emitted as.
    pub fn activity_kind(&self) -> ActivityKind {
        match self {
            StepKind::ShellCommand => ActivityKind::ShellCommandActivity,
            StepKind::Sql => ActivityKind::SqlActivity,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::ShellCommand => write!(f, "shell_command"),
            StepKind::Sql => write!(f, "sql"),
        }
    }
}

/// A step as declared in a pipeline description, before validation.
///
/// Field names follow the camelCase boundary shape; the snake_case spellings
/// used by older pipeline files are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Unique name of the step within the pipeline.
    pub name: String,
    /// Kind of the step.
    #[serde(alias = "step_type")]
    pub kind: StepKind,
    /// Command executed directly.
    #[serde(default)]
    pub command: Option<String>,
    /// Local path of a script to stage and execute.
    #[serde(default)]
    pub script: Option<PathBuf>,
    /// Upstream data node read by the step.
    #[serde(default, alias = "input_node")]
    pub input_node: Option<NodeRef>,
    /// Override for the step's base output location.
    #[serde(default, alias = "output_path")]
    pub output_path: Option<String>,
    /// Named outputs, each a path below the base output location.
    #[serde(default, alias = "output_map", alias = "output_node")]
    pub output_map: Option<BTreeMap<String, String>>,
    /// Arguments passed to the script or command, in any supported shape.
    #[serde(default, alias = "script_arguments")]
    pub script_arguments: Option<serde_json::Value>,
    /// Extra local files staged next to the script.
    #[serde(default, alias = "additional_files", alias = "additional_s3_files")]
    pub additional_files: Vec<PathBuf>,
    /// Steps that must finish before this one, beyond the input producer.
    #[serde(default, alias = "depends_on")]
    pub depends_on: Vec<String>,
    /// Requested resource type, e.g. "emr".
    #[serde(default, alias = "resource_type")]
    pub resource_type: Option<String>,
}

impl StepDefinition {
    /// Creates a definition with only a name and a kind.
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Sets the command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Sets the script path.
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Reads from the sole output of another step.
    pub fn with_input_node(mut self, step: impl Into<String>) -> Self {
        self.input_node = Some(NodeRef::step(step));
        self
    }

    /// Reads from one named output of another step.
    pub fn with_input_output(mut self, step: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_node = Some(NodeRef::output(step, output));
        self
    }

    /// Sets the output path override.
    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Adds a named output.
    pub fn with_output(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.output_map
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), path.into());
        self
    }

    /// Sets the raw script arguments.
    pub fn with_script_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.script_arguments = Some(arguments);
        self
    }

    /// Adds an additional file to stage.
    pub fn with_additional_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional_files.push(path.into());
        self
    }

    /// Adds an explicit dependency.
    pub fn with_depends_on(mut self, step: impl Into<String>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    /// Sets the requested resource type.
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

/// What a step executes: a command, or a script that has to be staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Command(String),
    Script(PathBuf),
}

impl StepAction {
    /// Returns true if the step runs a staged script.
    pub fn is_script(&self) -> bool {
        matches!(self, StepAction::Script(_))
    }

    /// Returns the local script path, if any.
    pub fn script(&self) -> Option<&Path> {
        match self {
            StepAction::Script(path) => Some(path),
            StepAction::Command(_) => None,
        }
    }
}

/// A validated step, ready to compile.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    name: String,
    kind: StepKind,
    action: StepAction,
    input_node: Option<NodeRef>,
    output_path: Option<String>,
    output_map: Option<BTreeMap<String, String>>,
    script_arguments: Option<ScriptArguments>,
    additional_files: Vec<PathBuf>,
    depends_on: Vec<String>,
    resource_type: Option<ResourceKind>,
}

impl Step {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn action(&self) -> &StepAction {
        &self.action
    }

    pub fn input_node(&self) -> Option<&NodeRef> {
        self.input_node.as_ref()
    }

    /// Output path override; blank overrides are dropped during validation.
    pub fn output_path(&self) -> Option<&str> {
        self.output_path.as_deref()
    }

    /// Named outputs; an empty map is dropped during validation.
    pub fn output_map(&self) -> Option<&BTreeMap<String, String>> {
        self.output_map.as_ref()
    }

    pub fn script_arguments(&self) -> Option<&ScriptArguments> {
        self.script_arguments.as_ref()
    }

    pub fn additional_files(&self) -> &[PathBuf] {
        &self.additional_files
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Resource the step asked for, if it overrides its kind's default.
    pub fn resource_type(&self) -> Option<ResourceKind> {
        self.resource_type
    }

    /// Resource kind the step runs on after applying its override.
    pub fn effective_resource(&self) -> ResourceKind {
        self.resource_type
            .unwrap_or_else(|| self.kind.default_resource())
    }
}

impl TryFrom<StepDefinition> for Step {
    type Error = StepError;

    fn try_from(definition: StepDefinition) -> Result<Self, Self::Error> {
        let StepDefinition {
            name,
            kind,
            command,
            script,
            input_node,
            output_path,
            output_map,
            script_arguments,
            additional_files,
            depends_on,
            resource_type,
        } = definition;

        if !is_valid_name(&name) {
            return Err(StepError::InvalidStepName(name));
        }

        let action = match (command, script) {
            (Some(command), None) => StepAction::Command(command),
            (None, Some(script)) => StepAction::Script(script),
            (Some(_), Some(_)) => {
                return Err(StepError::AmbiguousStepDefinition {
                    step: name,
                    found: "both command and script".to_string(),
                })
            }
            (None, None) => {
                return Err(StepError::AmbiguousStepDefinition {
                    step: name,
                    found: "neither command nor script".to_string(),
                })
            }
        };

        let reads_itself = input_node.as_ref().is_some_and(|node| node.step == name);
        if reads_itself || depends_on.iter().any(|dep| *dep == name) {
            return Err(StepError::SelfDependency(name));
        }

        let script_arguments = ScriptArguments::parse(&name, script_arguments.as_ref())?;

        let output_map = output_map.filter(|map| !map.is_empty());
        if let Some(map) = &output_map {
            for (key, path) in map {
                if key.trim().is_empty() {
                    return Err(StepError::InvalidOutputMap {
                        step: name,
                        message: "output names cannot be blank".to_string(),
                    });
                }
                if path.trim().trim_matches('/').is_empty() {
                    return Err(StepError::InvalidOutputMap {
                        step: name,
                        message: format!("output '{}' has a blank path", key),
                    });
                }
            }
        }

        Ok(Self {
            kind,
            action,
            input_node,
            output_path: output_path.filter(|path| !path.trim().is_empty()),
            output_map,
            script_arguments,
            additional_files,
            depends_on,
            resource_type: resource_type.as_deref().map(ResourceKind::from_type_name),
            name,
        })
    }
}

/// Checks that a name contains only alphanumerics, hyphens, and underscores.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_step_validates() {
        let step = Step::try_from(
            StepDefinition::new("count_rows", StepKind::ShellCommand).with_command("wc -l"),
        )
        .expect("command step should validate");

        assert_eq!(step.name(), "count_rows");
        assert_eq!(step.action(), &StepAction::Command("wc -l".to_string()));
        assert!(step.script_arguments().is_none());
    }

    #[test]
    fn test_script_step_validates() {
        let step = Step::try_from(
            StepDefinition::new("clean", StepKind::ShellCommand).with_script("scripts/clean.py"),
        )
        .expect("script step should validate");

        assert!(step.action().is_script());
        assert_eq!(step.action().script(), Some(Path::new("scripts/clean.py")));
    }

    #[test]
    fn test_both_command_and_script_is_ambiguous() {
        let result = Step::try_from(
            StepDefinition::new("clean", StepKind::ShellCommand)
                .with_command("echo hi")
                .with_script("scripts/clean.py"),
        );

        match result {
            Err(StepError::AmbiguousStepDefinition { step, found }) => {
                assert_eq!(step, "clean");
                assert!(found.contains("both"));
            }
            other => panic!("expected AmbiguousStepDefinition, got {:?}", other),
        }
    }

    #[test]
    fn test_neither_command_nor_script_is_ambiguous() {
        let result = Step::try_from(StepDefinition::new("clean", StepKind::Sql));

        match result {
            Err(StepError::AmbiguousStepDefinition { found, .. }) => {
                assert!(found.contains("neither"));
            }
            other => panic!("expected AmbiguousStepDefinition, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_step_names() {
        for name in ["", "has space", "dot.name", "slash/name"] {
            let result =
                Step::try_from(StepDefinition::new(name, StepKind::Sql).with_command("SELECT 1"));
            assert!(
                matches!(result, Err(StepError::InvalidStepName(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_self_dependency_rejected() {
        let result = Step::try_from(
            StepDefinition::new("loop", StepKind::ShellCommand)
                .with_command("true")
                .with_depends_on("loop"),
        );
        assert!(matches!(result, Err(StepError::SelfDependency(ref s)) if s == "loop"));

        let result = Step::try_from(
            StepDefinition::new("loop", StepKind::ShellCommand)
                .with_command("true")
                .with_input_node("loop"),
        );
        assert!(matches!(result, Err(StepError::SelfDependency(_))));
    }

    #[test]
    fn test_invalid_arguments_fail_validation() {
        let result = Step::try_from(
            StepDefinition::new("clean", StepKind::ShellCommand)
                .with_command("clean.sh")
                .with_script_arguments(json!(42)),
        );
        assert!(matches!(
            result,
            Err(StepError::InvalidArgumentShape { ref step, .. }) if step == "clean"
        ));
    }

    #[test]
    fn test_blank_overrides_are_dropped() {
        let mut definition = StepDefinition::new("clean", StepKind::ShellCommand)
            .with_command("clean.sh")
            .with_output_path("   ");
        definition.output_map = Some(BTreeMap::new());

        let step = Step::try_from(definition).expect("step should validate");
        assert!(step.output_path().is_none());
        assert!(step.output_map().is_none());
    }

    #[test]
    fn test_blank_output_map_paths_rejected() {
        for path in ["", "  ", "/"] {
            let result = Step::try_from(
                StepDefinition::new("s", StepKind::ShellCommand)
                    .with_command("split.sh")
                    .with_output("a", "pathA")
                    .with_output("b", path),
            );
            assert!(
                matches!(
                    result,
                    Err(StepError::InvalidOutputMap { ref step, ref message })
                        if step == "s" && message.contains("'b'")
                ),
                "path {:?} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_blank_output_name_rejected() {
        let result = Step::try_from(
            StepDefinition::new("s", StepKind::ShellCommand)
                .with_command("split.sh")
                .with_output(" ", "pathA"),
        );
        assert!(matches!(result, Err(StepError::InvalidOutputMap { .. })));
    }

    #[test]
    fn test_effective_resource() {
        let step = Step::try_from(
            StepDefinition::new("crunch", StepKind::ShellCommand).with_command("crunch"),
        )
        .unwrap();
        assert_eq!(step.resource_type(), None);
        assert_eq!(step.effective_resource(), ResourceKind::Ec2);

        let step = Step::try_from(
            StepDefinition::new("crunch", StepKind::ShellCommand)
                .with_command("crunch")
                .with_resource_type("EMR"),
        )
        .unwrap();
        assert_eq!(step.effective_resource(), ResourceKind::Emr);
    }

    #[test]
    fn test_step_kind_defaults() {
        assert_eq!(StepKind::ShellCommand.default_resource(), ResourceKind::Ec2);
        assert_eq!(StepKind::Sql.default_resource(), ResourceKind::Ec2);
        assert_eq!(
            StepKind::Sql.activity_kind(),
            ActivityKind::SqlActivity
        );
        assert_eq!(StepKind::Sql.to_string(), "sql");
    }

    #[test]
    fn test_definition_deserializes_aliases() {
        let definition: StepDefinition = serde_json::from_value(json!({
            "name": "load",
            "step_type": "transform",
            "script": "scripts/load.sh",
            "input_node": "extract",
            "output_path": "s3://bucket/load",
            "script_arguments": ["--fast"],
            "additional_s3_files": ["lib/helpers.sh"],
            "depends_on": ["setup"],
            "resource_type": "emr"
        }))
        .expect("definition should deserialize");

        assert_eq!(definition.kind, StepKind::ShellCommand);
        assert_eq!(definition.input_node, Some(NodeRef::step("extract")));
        assert_eq!(definition.output_path.as_deref(), Some("s3://bucket/load"));
        assert_eq!(definition.additional_files, vec![PathBuf::from("lib/helpers.sh")]);
        assert_eq!(definition.depends_on, vec!["setup".to_string()]);
        assert_eq!(definition.resource_type.as_deref(), Some("emr"));
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("load_users-2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a b"));
    }
}
