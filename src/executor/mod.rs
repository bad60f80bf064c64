#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Stepbot.

This module wires together:
- `action_executor`: validation and dispatch of action steps to a capability provider
- `result`: the `ExecutionResult` returned for every action

Typical usage:
- Build a provider (`DesktopProvider`, or `RecordingProvider` in tests).
- Wrap it in an `ActionExecutor`.
- Call `execute` with a typed `Action`, or `execute_value` with raw JSON.

Example:
```no_run
use std::sync::Arc;
use stepbot::config::{Action, Step};
use stepbot::executor::ActionExecutor;
use stepbot::provider::DesktopProvider;

# async fn demo() {
let executor = ActionExecutor::new(Arc::new(DesktopProvider::new(true))); // dry-run
let action = Action::new("save", vec![Step::Shortcut { keys: vec!["ctrl".into(), "s".into()] }]);
let result = executor.execute(&action).await;
assert!(result.success);
# }
```

Public re-exports:
- `ActionExecutor`: runs actions; never returns an error, only results.
- `ExecutionResult`: success flag, elapsed time and encoded error.
*/

pub mod action_executor;
pub mod result;

// Re-exports for convenient access from `stepbot::executor::*`
pub use action_executor::{ActionExecutor, build_command_line};
pub use result::ExecutionResult;
