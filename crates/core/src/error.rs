use serde::{Deserialize, Serialize};
use std::fmt;

/// A design evaluation error.
///
/// Errors reported while a host DSL call is running carry the host call
/// site. Errors found by the finalize passes have no location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl EvalError {
    pub fn new(message: impl Into<String>, file: Option<&str>, line: Option<u32>) -> Self {
        EvalError {
            message: message.into(),
            file: file.map(str::to_owned),
            line,
        }
    }

    /// An error with no source location (finalize passes).
    pub fn detached(message: impl Into<String>) -> Self {
        EvalError::new(message, None, None)
    }

    /// Serialize to JSON, always including every field.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "file":    self.file,
            "line":    self.line,
            "message": self.message,
        })
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file, line, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for EvalError {}

/// Failure of a whole compilation run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The design has errors; every accumulated error is kept.
    #[error("{}", join_lines(.0))]
    Dsl(Vec<EvalError>),

    /// The compiler configuration could not be parsed.
    #[error("invalid compiler configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The compiler configuration file could not be read.
    #[error("cannot read compiler configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// The accumulated design errors, empty for non-design failures.
    pub fn eval_errors(&self) -> &[EvalError] {
        match self {
            CompileError::Dsl(errors) => errors,
            _ => &[],
        }
    }
}

fn join_lines(errors: &[EvalError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A structural mismatch or unsupported shape found by the transformation
/// engine. Converted into an [`EvalError`] when reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("types don't match: {0}")]
    Mismatch(String),

    #[error("{path}: {message}")]
    Unsupported { path: String, message: String },

    #[error("unknown external record \"{0}\"")]
    UnknownRecord(String),
}
