use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ExecutionError;

/// Outcome of one `ActionExecutor::execute` call.
///
/// `error` is present iff `success` is false and holds the encoded
/// [`ExecutionError`]. On the wire `elapsed` is `executionTime`, in whole
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(rename = "executionTime", with = "millis")]
    pub elapsed: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(elapsed: Duration) -> Self {
        Self {
            success: true,
            elapsed,
            error: None,
        }
    }

    pub fn failed(elapsed: Duration, error: &ExecutionError) -> Self {
        Self {
            success: false,
            elapsed,
            error: Some(error.to_json_string()),
        }
    }

    /// Elapsed wall-clock time in whole milliseconds.
    pub fn execution_time_ms(&self) -> u64 {
        whole_millis(self.elapsed)
    }

    /// Decode the error string back into its structured form.
    ///
    /// Returns `None` for successful results and for strings that are not valid encodings.
    pub fn parsed_error(&self) -> Option<ExecutionError> {
        self.error
            .as_deref()
            .and_then(|s| ExecutionError::from_json_str(s).ok())
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn whole_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::whole_millis(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
