//! Error taxonomy of the action executor.
//!
//! An [`ExecutionError`] never escapes `ActionExecutor::execute`: it is built at
//! the point of failure, encoded with [`ExecutionError::to_json_string`] into the
//! `ExecutionResult`, and dropped. Callers that want the structure back use
//! [`ExecutionError::from_json_str`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

use crate::config::StepKind;

/// Value of the `name` field in every encoded error.
pub const ERROR_NAME: &str = "ActionExecutionError";

/// Failure category reported in the `code` field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The action itself is malformed; no step was attempted.
    InvalidAction,
    /// A step's payload failed type or range checks.
    InvalidStepPayload,
    /// The step's `type` is not one the executor knows.
    UnsupportedStepType,
    /// The capability provider rejected an otherwise valid step.
    StepExecutionFailed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidAction => "INVALID_ACTION",
            ErrorCode::InvalidStepPayload => "INVALID_STEP_PAYLOAD",
            ErrorCode::UnsupportedStepType => "UNSUPPORTED_STEP_TYPE",
            ErrorCode::StepExecutionFailed => "STEP_EXECUTION_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure of one action, with the position and kind of the offending step.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct ExecutionError {
    pub message: String,
    pub code: ErrorCode,
    pub step_index: Option<usize>,
    pub step_type: Option<StepKind>,
    pub details: Option<Value>,
}

/// Wire shape; field order here is the order in the encoded string.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorRecord {
    name: String,
    message: String,
    code: ErrorCode,
    step_index: Option<usize>,
    step_type: Option<StepKind>,
    details: Option<Value>,
}

impl ExecutionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            step_index: None,
            step_type: None,
            details: None,
        }
    }

    pub fn invalid_action(message: impl Into<String>, details: Value) -> Self {
        Self::new(ErrorCode::InvalidAction, message).with_details(details)
    }

    pub fn invalid_payload(
        index: usize,
        kind: StepKind,
        message: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::new(ErrorCode::InvalidStepPayload, message)
            .at_step(index, Some(kind))
            .with_details(payload)
    }

    pub fn unsupported(index: usize, raw_type: Value) -> Self {
        let shown = match &raw_type {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self::new(
            ErrorCode::UnsupportedStepType,
            format!("Unsupported step type '{shown}'"),
        )
        .at_step(index, None)
        .with_details(json!({ "type": raw_type }))
    }

    /// Wrap a provider failure for step `index`.
    ///
    /// An error that already carries an `ExecutionError` is returned as is.
    pub fn step_failed(index: usize, kind: StepKind, cause: anyhow::Error) -> Self {
        match cause.downcast::<ExecutionError>() {
            Ok(typed) => typed,
            Err(cause) => Self::new(
                ErrorCode::StepExecutionFailed,
                format!("Step {index} ({kind}) failed: {cause}"),
            )
            .at_step(index, Some(kind))
            .with_details(normalize_cause(&cause)),
        }
    }

    pub fn at_step(mut self, index: usize, kind: Option<StepKind>) -> Self {
        self.step_index = Some(index);
        self.step_type = kind;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Deterministic encoding: `name, message, code, stepIndex, stepType, details`.
    pub fn to_json_string(&self) -> String {
        let record = ErrorRecord {
            name: ERROR_NAME.to_string(),
            message: self.message.clone(),
            code: self.code,
            step_index: self.step_index,
            step_type: self.step_type,
            details: self.details.clone(),
        };
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(&record).unwrap_or_else(|_| {
            format!(
                r#"{{"name":"{ERROR_NAME}","message":"unserializable error","code":"{}"}}"#,
                self.code
            )
        })
    }

    /// Parse a string produced by [`ExecutionError::to_json_string`].
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        let record: ErrorRecord = serde_json::from_str(s)?;
        Ok(Self {
            message: record.message,
            code: record.code,
            step_index: record.step_index,
            step_type: record.step_type,
            details: record.details,
        })
    }
}

/// Errors raised by the bundled capability providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown key name '{0}'")]
    UnknownKey(String),

    #[error("empty key combination")]
    EmptyShortcut,

    #[error("command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("input simulation failed: {0}")]
    Input(String),

    #[error("scripted failure on call #{call}")]
    Scripted { call: usize },
}

/// Reduce a provider error to `{ "name", "message" }` for the `details` field.
///
/// `message` holds the whole context chain; `name` is a coarse category.
pub fn normalize_cause(err: &anyhow::Error) -> Value {
    let name = if err.downcast_ref::<ProviderError>().is_some() {
        "ProviderError"
    } else if err.downcast_ref::<std::io::Error>().is_some() {
        "IoError"
    } else if err.downcast_ref::<tokio::task::JoinError>().is_some() {
        "JoinError"
    } else {
        "Error"
    };
    json!({
        "name": name,
        "message": format!("{err:#}"),
    })
}
