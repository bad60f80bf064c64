use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Root configuration for Stepbot.
///
/// Deserialized from a JSON file. `actions` are kept as raw JSON documents:
/// their shape is checked by the executor when each action runs, so a
/// malformed entry shows up as a failed `ExecutionResult` instead of aborting
/// the whole load.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// How many times the whole action list is executed (default: 1).
    #[serde(default = "default_runs")]
    pub runs: u32,

    /// Pause inserted between two runs, in milliseconds (default: 0).
    #[serde(default)]
    pub pause_between_runs_ms: u64,

    /// Actions executed in order on every run.
    #[serde(default)]
    #[schemars(with = "Vec<Action>")]
    pub actions: Vec<Value>,
}

fn default_runs() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            pause_between_runs_ms: 0,
            actions: Vec::new(),
        }
    }
}

impl Config {
    /// Built-in demo: save shortcut, short pause, some typing and a shell echo, 50 times over.
    pub fn demo() -> Self {
        let actions = vec![
            Action::new(
                "save-shortcut",
                vec![Step::Shortcut {
                    keys: vec!["ctrl".into(), "shift".into(), "s".into()],
                }],
            ),
            Action::new("pause", vec![Step::Delay { duration_ms: 500.0 }]),
            Action::new(
                "type-hello",
                vec![Step::Text {
                    value: "Hello".into(),
                    clear_before_type: None,
                }],
            ),
            Action::new(
                "echo-done",
                vec![Step::Command {
                    command: "echo done".into(),
                    args: None,
                    cwd: None,
                    timeout_ms: None,
                }],
            ),
        ];

        Self {
            runs: 50,
            pause_between_runs_ms: 0,
            actions: actions
                .iter()
                .filter_map(|a| serde_json::to_value(a).ok())
                .collect(),
        }
    }
}

/// A named, ordered list of steps executed as one unit.
///
/// The id is opaque and caller-assigned; nothing checks it for uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Action {
    pub id: String,
    pub steps: Vec<Step>,
}

impl Action {
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            steps,
        }
    }
}

/// One automation step.
///
/// Wire format: `{ "type": "SHORTCUT", "payload": { "keys": ["ctrl", "s"] } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    /// Press a key combination, e.g. `["ctrl", "shift", "s"]`.
    Shortcut { keys: Vec<String> },

    /// Type literal text, optionally wiping the focused field first.
    #[serde(rename_all = "camelCase")]
    Text {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clear_before_type: Option<bool>,
    },

    /// Run a shell command line. `cwd` and `timeout_ms` are carried along as opaque
    /// JSON: they are neither validated nor acted upon.
    #[serde(rename_all = "camelCase")]
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<Value>,
    },

    /// Wait for a number of milliseconds (fractions allowed).
    #[serde(rename_all = "camelCase")]
    Delay { duration_ms: f64 },
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Shortcut { .. } => StepKind::Shortcut,
            Step::Text { .. } => StepKind::Text,
            Step::Command { .. } => StepKind::Command,
            Step::Delay { .. } => StepKind::Delay,
        }
    }

    /// The payload half of the wire representation.
    pub fn payload(&self) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("payload").map(Value::take))
            .unwrap_or(Value::Null)
    }
}

/// Discriminant of [`Step`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Shortcut,
    Text,
    Command,
    Delay,
}

impl StepKind {
    pub const ALL: [StepKind; 4] = [
        StepKind::Shortcut,
        StepKind::Text,
        StepKind::Command,
        StepKind::Delay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Shortcut => "SHORTCUT",
            StepKind::Text => "TEXT",
            StepKind::Command => "COMMAND",
            StepKind::Delay => "DELAY",
        }
    }

    /// Parse a wire tag (`"SHORTCUT"`, ...). Tags are case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
