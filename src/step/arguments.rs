//! Script argument parsing and translation.
//!
//! Pipeline files describe script arguments in several shapes: a single
//! string, a list mixing literal tokens and `{name, type, value}` entries, or
//! a mapping of argument names to values. They are parsed once into
//! [`ScriptArguments`] and rendered into the flat token list handed to the
//! activity. Named entries render as `--<name>=<value>`.

use serde_json::Value;
use tracing::warn;

use crate::error::StepError;

/// Declared type of a named argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentType {
    #[default]
    String,
    /// Reserved for SQL-aware rendering; renders exactly like `String` today.
    Sql,
}

impl ArgumentType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ArgumentType::String),
            "sql" => Some(ArgumentType::Sql),
            _ => None,
        }
    }
}

/// One entry of an ordered argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Passed through verbatim.
    Literal(String),
    /// Rendered through [`format_key_value`].
    Named {
        name: String,
        kind: ArgumentType,
        value: String,
    },
}

/// Script arguments in one of the supported shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptArguments {
    Ordered(Vec<Argument>),
    /// Key/value pairs. The order carries no meaning.
    Keyed(Vec<(String, String)>),
    Scalar(String),
}

impl ScriptArguments {
    /// Parses raw script arguments declared on `step`.
    ///
    /// `None` and an explicit null both mean "no arguments".
    ///
    /// # Errors
    ///
    /// Returns `StepError::InvalidArgumentShape` for non-string scalars,
    /// nested lists, nulls inside a list, named entries missing `name` or
    /// `value`, and non-scalar mapping values. Unknown argument types are
    /// logged and rendered as strings.
    pub fn parse(step: &str, raw: Option<&Value>) -> Result<Option<Self>, StepError> {
        let shape_error = |message: String| StepError::InvalidArgumentShape {
            step: step.to_string(),
            message,
        };

        let raw = match raw {
            None | Some(Value::Null) => return Ok(None),
            Some(raw) => raw,
        };

        match raw {
            Value::String(s) => Ok(Some(ScriptArguments::Scalar(s.clone()))),
            Value::Array(items) => {
                let mut arguments = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let argument = match item {
                        Value::Object(entry) => parse_named(entry).map_err(|message| {
                            shape_error(format!("argument {}: {}", index, message))
                        })?,
                        other => Argument::Literal(scalar_string(other).ok_or_else(|| {
                            shape_error(format!(
                                "argument {} must be a scalar or a {{name, type, value}} entry, got {}",
                                index,
                                describe(other)
                            ))
                        })?),
                    };
                    arguments.push(argument);
                }
                Ok(Some(ScriptArguments::Ordered(arguments)))
            }
            Value::Object(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = scalar_string(value).ok_or_else(|| {
                        shape_error(format!(
                            "value of '{}' must be a scalar, got {}",
                            key,
                            describe(value)
                        ))
                    })?;
                    pairs.push((key.clone(), value));
                }
                Ok(Some(ScriptArguments::Keyed(pairs)))
            }
            other => Err(shape_error(format!(
                "expected a string, a list, or a mapping, got {}",
                describe(other)
            ))),
        }
    }

    /// Renders the arguments as command-line tokens.
    pub fn render(&self) -> Vec<String> {
        match self {
            ScriptArguments::Scalar(s) => vec![s.clone()],
            ScriptArguments::Ordered(arguments) => arguments
                .iter()
                .map(|argument| match argument {
                    Argument::Literal(token) => token.clone(),
                    // TODO: render sql-typed values through the SQL script
                    // library once it can be called from here.
                    Argument::Named {
                        name,
                        kind: ArgumentType::Sql,
                        value,
                    } => format_key_value(name, value),
                    Argument::Named {
                        name,
                        kind: ArgumentType::String,
                        value,
                    } => format_key_value(name, value),
                })
                .collect(),
            ScriptArguments::Keyed(pairs) => pairs
                .iter()
                .map(|(key, value)| format_key_value(key, value))
                .collect(),
        }
    }
}

/// Translates optional script arguments into command-line tokens.
///
/// No arguments stay `None`; an empty list stays empty.
pub fn translate(arguments: Option<&ScriptArguments>) -> Option<Vec<String>> {
    arguments.map(ScriptArguments::render)
}

/// Formats a key and value as a single `--key=value` token.
///
/// Nothing is escaped or quoted.
pub fn format_key_value(key: &str, value: &str) -> String {
    ["--", key, "=", value].concat()
}

fn parse_named(entry: &serde_json::Map<String, Value>) -> Result<Argument, String> {
    let name = match entry.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(other) => return Err(format!("'name' must be a string, got {}", describe(other))),
        None => return Err("missing 'name'".to_string()),
    };

    let value = match entry.get("value") {
        None | Some(Value::Null) => return Err(format!("'{}' is missing 'value'", name)),
        Some(value) => scalar_string(value)
            .ok_or_else(|| format!("'{}' value must be a scalar, got {}", name, describe(value)))?,
    };

    let kind = match entry.get("type") {
        None | Some(Value::Null) => ArgumentType::default(),
        Some(Value::String(kind)) => ArgumentType::parse(kind).unwrap_or_else(|| {
            warn!(argument = %name, kind = %kind, "unknown argument type, rendering as string");
            ArgumentType::default()
        }),
        Some(other) => {
            warn!(argument = %name, kind = %other, "unknown argument type, rendering as string");
            ArgumentType::default()
        }
    };

    Ok(Argument::Named { name, kind, value })
}

/// String form of a scalar value; `None` for nulls, lists, and mappings.
///
/// Booleans render as `True`/`False`, the tokens existing step scripts parse.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
