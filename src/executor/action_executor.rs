use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::config::{Action, Step, StepKind};
use crate::error::ExecutionError;
use crate::executor::result::{ExecutionResult, whole_millis};
use crate::provider::CapabilityProvider;

/// Select-all then delete, sent before typing when a text step asks for it.
const CLEAR_SEQUENCE: [&[&str]; 2] = [&["ctrl", "a"], &["delete"]];

/// Runs actions step by step against an injected capability provider.
///
/// Execution never fails from the caller's point of view: every problem ends
/// up in the returned [`ExecutionResult`]. The executor keeps no per-action
/// state, so one instance can serve concurrent `execute` calls.
#[derive(Clone)]
pub struct ActionExecutor {
    provider: Arc<dyn CapabilityProvider>,
}

impl ActionExecutor {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn CapabilityProvider> {
        &self.provider
    }

    /// Execute a typed action.
    pub async fn execute(&self, action: &Action) -> ExecutionResult {
        let start = Instant::now();
        debug!(
            target: "stepbot::executor",
            id = %action.id, steps = action.steps.len(), provider = self.provider.name(),
            "Executing action"
        );

        let outcome = self.run_steps(&action.steps).await;
        finish(&action.id, start, outcome)
    }

    /// Execute an action given as raw JSON.
    ///
    /// The shape (`id` string, `steps` array) is checked up front; each step is
    /// decoded right before it runs, so earlier steps still execute when a later
    /// one is malformed.
    pub async fn execute_value(&self, action: &Value) -> ExecutionResult {
        let start = Instant::now();

        let (id, steps) = match action_shape(action) {
            Ok(shape) => shape,
            Err(err) => return finish("<invalid>", start, Err(err)),
        };
        debug!(
            target: "stepbot::executor",
            %id, steps = steps.len(), provider = self.provider.name(),
            "Executing action"
        );

        let outcome = self.run_raw_steps(steps).await;
        finish(id, start, outcome)
    }

    async fn run_steps(&self, steps: &[Step]) -> Result<(), ExecutionError> {
        for (index, step) in steps.iter().enumerate() {
            self.execute_step(index, step).await?;
        }
        Ok(())
    }

    async fn run_raw_steps(&self, steps: &[Value]) -> Result<(), ExecutionError> {
        for (index, raw) in steps.iter().enumerate() {
            let step = decode_step(index, raw)?;
            self.execute_step(index, &step).await?;
        }
        Ok(())
    }

    /// Validate one step and lower it to provider primitives.
    pub async fn execute_step(&self, index: usize, step: &Step) -> Result<(), ExecutionError> {
        let kind = step.kind();
        trace!(target: "stepbot::executor", step_index = index, step_type = %kind, "Executing step");

        let invalid = |message: &str| {
            ExecutionError::invalid_payload(index, kind, message, step.payload())
        };

        let outcome = match step {
            Step::Shortcut { keys } => {
                if keys.is_empty() {
                    return Err(invalid("Shortcut step requires at least one key"));
                }
                self.provider.execute_shortcut(keys.clone()).await
            }
            Step::Text {
                value,
                clear_before_type,
            } => {
                self.type_text(value, clear_before_type.unwrap_or(false))
                    .await
            }
            Step::Command { command, args, .. } => {
                if command.trim().is_empty() {
                    return Err(invalid("Command step requires a non-empty command"));
                }
                let line = build_command_line(command, args.as_deref().unwrap_or_default());
                self.provider.run_command(&line).await
            }
            Step::Delay { duration_ms } => {
                let Some(duration) = delay_duration(*duration_ms) else {
                    return Err(invalid(
                        "Delay step requires a finite, non-negative durationMs",
                    ));
                };
                self.provider.delay(duration).await
            }
        };

        outcome.map_err(|cause| ExecutionError::step_failed(index, kind, cause))
    }

    async fn type_text(&self, value: &str, clear_first: bool) -> anyhow::Result<()> {
        if clear_first {
            for combo in CLEAR_SEQUENCE {
                let keys = combo.iter().map(|k| k.to_string()).collect();
                self.provider.execute_shortcut(keys).await?;
            }
        }
        self.provider.type_text(value).await
    }
}

fn finish(id: &str, start: Instant, outcome: Result<(), ExecutionError>) -> ExecutionResult {
    let elapsed = start.elapsed();
    match outcome {
        Ok(()) => {
            debug!(
                target: "stepbot::executor",
                %id, elapsed_ms = whole_millis(elapsed),
                "Action succeeded"
            );
            ExecutionResult::succeeded(elapsed)
        }
        Err(err) => {
            warn!(
                target: "stepbot::executor",
                %id, code = %err.code, step_index = ?err.step_index,
                step_type = ?err.step_type, elapsed_ms = whole_millis(elapsed),
                "Action failed: {}", err.message
            );
            ExecutionResult::failed(elapsed, &err)
        }
    }
}

fn action_shape(action: &Value) -> Result<(&str, &[Value]), ExecutionError> {
    let id = action.get("id").and_then(Value::as_str);
    let steps = action.get("steps").and_then(Value::as_array);
    match (id, steps) {
        (Some(id), Some(steps)) => Ok((id, steps.as_slice())),
        _ => Err(ExecutionError::invalid_action(
            "Action must have a string `id` and a `steps` array",
            action.clone(),
        )),
    }
}

fn decode_step(index: usize, raw: &Value) -> Result<Step, ExecutionError> {
    let tag = raw.get("type");
    let Some(kind) = tag.and_then(Value::as_str).and_then(StepKind::from_tag) else {
        return Err(ExecutionError::unsupported(
            index,
            tag.cloned().unwrap_or(Value::Null),
        ));
    };

    serde_json::from_value::<Step>(raw.clone()).map_err(|e| {
        ExecutionError::invalid_payload(
            index,
            kind,
            format!("Invalid {kind} payload: {e}"),
            raw.get("payload").cloned().unwrap_or(Value::Null),
        )
    })
}

fn delay_duration(ms: f64) -> Option<Duration> {
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(ms / 1000.0).ok()
}

/// Append each argument double-quoted, with inner `"` escaped as `\"`.
///
/// Meant for `cmd.exe`-style parsing. This is not shell-injection safe: `$`,
/// backticks and backslashes pass through untouched on POSIX shells, so never
/// feed it untrusted arguments.
pub fn build_command_line(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        return command.to_string();
    }
    let quoted: Vec<String> = args
        .iter()
        .map(|arg| format!("\"{}\"", arg.replace('"', "\\\"")))
        .collect();
    format!("{command} {}", quoted.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ProviderError};
    use crate::provider::{Primitive, ProviderCall, RecordingProvider};
    use serde_json::json;

    fn executor() -> (ActionExecutor, Arc<RecordingProvider>) {
        with_provider(RecordingProvider::new())
    }

    fn with_provider(p: RecordingProvider) -> (ActionExecutor, Arc<RecordingProvider>) {
        let provider = Arc::new(p);
        (ActionExecutor::new(provider.clone()), provider)
    }

    fn shortcut(keys: &[&str]) -> Step {
        Step::Shortcut {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn text(value: &str, clear: Option<bool>) -> Step {
        Step::Text {
            value: value.into(),
            clear_before_type: clear,
        }
    }

    fn command(cmd: &str, args: Option<Vec<&str>>) -> Step {
        Step::Command {
            command: cmd.into(),
            args: args.map(|a| a.into_iter().map(String::from).collect()),
            cwd: None,
            timeout_ms: None,
        }
    }

    fn error_of(result: &ExecutionResult) -> ExecutionError {
        assert!(!result.success);
        result.parsed_error().expect("failed result must carry a parsable error")
    }

    #[tokio::test]
    async fn empty_action_succeeds() {
        let (exec, provider) = executor();
        let res = exec.execute(&Action::new("empty", vec![])).await;
        assert!(res.success);
        assert!(res.error.is_none());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn delay_then_shortcut_scenario() {
        let (exec, provider) = executor();
        let action = Action::new(
            "a1",
            vec![Step::Delay { duration_ms: 100.0 }, shortcut(&["ctrl", "s"])],
        );
        let res = exec.execute(&action).await;
        assert!(res.success, "{:?}", res.error);
        assert!(res.elapsed >= Duration::from_millis(100));
        assert!(res.execution_time_ms() >= 100);
        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::Delay(Duration::from_millis(100)),
                ProviderCall::Shortcut(vec!["ctrl".into(), "s".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn empty_command_is_invalid_payload() {
        let (exec, provider) = executor();
        let res = exec.execute(&Action::new("a2", vec![command("", None)])).await;
        let err = error_of(&res);
        assert_eq!(err.code, ErrorCode::InvalidStepPayload);
        assert_eq!(err.step_index, Some(0));
        assert_eq!(err.step_type, Some(StepKind::Command));
        assert!(res.error.unwrap().contains("INVALID_STEP_PAYLOAD"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_command_is_invalid_payload() {
        let (exec, _) = executor();
        let res = exec.execute(&Action::new("blank", vec![command("   ", None)])).await;
        assert_eq!(error_of(&res).code, ErrorCode::InvalidStepPayload);
    }

    #[tokio::test]
    async fn invalid_payloads_report_their_index() {
        let cases = vec![
            shortcut(&[]),
            Step::Delay { duration_ms: -1.0 },
            Step::Delay { duration_ms: f64::NAN },
            Step::Delay { duration_ms: f64::INFINITY },
            Step::Delay { duration_ms: 1e300 },
        ];
        for bad in cases {
            let (exec, _) = executor();
            let kind = bad.kind();
            let action = Action::new("x", vec![Step::Delay { duration_ms: 0.0 }, bad]);
            let err = error_of(&exec.execute(&action).await);
            assert_eq!(err.code, ErrorCode::InvalidStepPayload);
            assert_eq!(err.step_index, Some(1));
            assert_eq!(err.step_type, Some(kind));
        }
    }

    #[tokio::test]
    async fn valid_step_runs_once_before_invalid_one() {
        let (exec, provider) = executor();
        let action = Action::new("order", vec![text("hi", None), shortcut(&[])]);
        let err = error_of(&exec.execute(&action).await);
        assert_eq!(err.step_index, Some(1));
        assert_eq!(provider.calls(), vec![ProviderCall::TypeText("hi".into())]);
    }

    #[tokio::test]
    async fn aborts_after_first_failure() {
        let (exec, provider) =
            with_provider(RecordingProvider::new().fail_primitive(Primitive::RunCommand));
        let action = Action::new(
            "abort",
            vec![
                shortcut(&["ctrl", "c"]),
                command("make", None),
                text("never", None),
                Step::Delay { duration_ms: 0.0 },
            ],
        );
        let res = exec.execute(&action).await;
        let err = error_of(&res);
        assert_eq!(err.code, ErrorCode::StepExecutionFailed);
        assert_eq!(err.step_index, Some(1));
        assert_eq!(err.step_type, Some(StepKind::Command));
        assert_eq!(err.details.as_ref().unwrap()["name"], "ProviderError");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn clear_before_type_sends_select_all_then_delete() {
        let (exec, provider) = executor();
        let res = exec
            .execute(&Action::new("clear", vec![text("new", Some(true))]))
            .await;
        assert!(res.success);
        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::Shortcut(vec!["ctrl".into(), "a".into()]),
                ProviderCall::Shortcut(vec!["delete".into()]),
                ProviderCall::TypeText("new".into()),
            ]
        );
    }

    #[tokio::test]
    async fn clear_failure_is_reported_on_the_text_step() {
        let (exec, provider) = with_provider(RecordingProvider::new().fail_on_call(2));
        let action = Action::new(
            "clear-fail",
            vec![shortcut(&["esc"]), text("new", Some(true))],
        );
        let err = error_of(&exec.execute(&action).await);
        assert_eq!(err.code, ErrorCode::StepExecutionFailed);
        assert_eq!(err.step_index, Some(1));
        assert_eq!(err.step_type, Some(StepKind::Text));
        // esc, ctrl+a, delete (fails); no typing
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn no_clear_when_flag_false() {
        let (exec, provider) = executor();
        exec.execute(&Action::new("t", vec![text("x", Some(false))]))
            .await;
        assert_eq!(provider.calls(), vec![ProviderCall::TypeText("x".into())]);
    }

    #[test]
    fn command_line_quoting() {
        assert_eq!(
            build_command_line("echo", &["a b".into(), "x\"y".into()]),
            r#"echo "a b" "x\"y""#
        );
        assert_eq!(build_command_line("echo done", &[]), "echo done");
    }

    #[tokio::test]
    async fn command_without_args_passes_through() {
        let (exec, provider) = executor();
        exec.execute(&Action::new(
            "cmds",
            vec![
                command("  dir /b ", None),
                command("echo", Some(vec![])),
                command("echo", Some(vec!["a b", "x\"y"])),
            ],
        ))
        .await;
        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::RunCommand("  dir /b ".into()),
                ProviderCall::RunCommand("echo".into()),
                ProviderCall::RunCommand(r#"echo "a b" "x\"y""#.into()),
            ]
        );
    }

    #[tokio::test]
    async fn error_string_round_trips() {
        let (exec, _) = with_provider(RecordingProvider::new().fail_on_call(0));
        let res = exec
            .execute(&Action::new("rt", vec![shortcut(&["ctrl", "v"])]))
            .await;
        let raw = res.error.clone().unwrap();
        let err = ExecutionError::from_json_str(&raw).unwrap();
        assert_eq!(err.code, ErrorCode::StepExecutionFailed);
        assert_eq!(err.step_index, Some(0));
        assert_eq!(err.step_type, Some(StepKind::Shortcut));
        assert_eq!(err.to_json_string(), raw);
    }

    #[tokio::test]
    async fn untyped_action_shape_is_checked() {
        let (exec, provider) = executor();
        for bad in [
            json!({"steps": []}),
            json!({"id": 7, "steps": []}),
            json!({"id": "x"}),
            json!({"id": "x", "steps": {}}),
            json!("not an object"),
        ] {
            let err = error_of(&exec.execute_value(&bad).await);
            assert_eq!(err.code, ErrorCode::InvalidAction);
            assert_eq!(err.step_index, None);
            assert_eq!(err.step_type, None);
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn untyped_unknown_step_type_is_unsupported() {
        let (exec, provider) = executor();
        let action = json!({
            "id": "u",
            "steps": [
                {"type": "DELAY", "payload": {"durationMs": 0}},
                {"type": "MOUSE_CLICK", "payload": {}},
                {"type": "TEXT", "payload": {"value": "never"}}
            ]
        });
        let err = error_of(&exec.execute_value(&action).await);
        assert_eq!(err.code, ErrorCode::UnsupportedStepType);
        assert_eq!(err.step_index, Some(1));
        assert_eq!(err.details, Some(json!({"type": "MOUSE_CLICK"})));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn untyped_bad_payload_is_invalid_payload() {
        let (exec, provider) = executor();
        let action = json!({
            "id": "p",
            "steps": [
                {"type": "SHORTCUT", "payload": {"keys": ["ctrl", "s"]}},
                {"type": "TEXT", "payload": {"value": 12}}
            ]
        });
        let err = error_of(&exec.execute_value(&action).await);
        assert_eq!(err.code, ErrorCode::InvalidStepPayload);
        assert_eq!(err.step_index, Some(1));
        assert_eq!(err.step_type, Some(StepKind::Text));
        assert_eq!(err.details, Some(json!({"value": 12})));
        assert_eq!(provider.call_count(), 1);

        let action = json!({"id": "k", "steps": [{"type": "SHORTCUT", "payload": {"keys": [1, 2]}}]});
        let err = error_of(&exec.execute_value(&action).await);
        assert_eq!(err.code, ErrorCode::InvalidStepPayload);
        assert_eq!(err.step_index, Some(0));
    }

    #[tokio::test]
    async fn untyped_valid_action_runs() {
        let (exec, provider) = executor();
        let action = json!({
            "id": "ok",
            "steps": [
                {"type": "COMMAND", "payload": {"command": "echo", "args": ["hi there"], "cwd": "/tmp"}},
                {"type": "TEXT", "payload": {"value": "done", "clearBeforeType": true}}
            ]
        });
        let res = exec.execute_value(&action).await;
        assert!(res.success, "{:?}", res.error);
        assert_eq!(provider.call_count(), 4);
        assert_eq!(
            provider.calls()[0],
            ProviderCall::RunCommand(r#"echo "hi there""#.into())
        );
    }

    #[tokio::test]
    async fn command_cwd_and_timeout_are_not_validated() {
        for payload in [
            json!({"command": "echo", "timeoutMs": 1500.5}),
            json!({"command": "echo", "timeoutMs": -1}),
            json!({"command": "echo", "cwd": 5}),
            json!({"command": "echo", "cwd": null, "timeoutMs": "soon"}),
        ] {
            let (exec, provider) = executor();
            let action = json!({
                "id": "opaque",
                "steps": [{"type": "COMMAND", "payload": payload}]
            });
            let res = exec.execute_value(&action).await;
            assert!(res.success, "{payload}: {:?}", res.error);
            assert_eq!(provider.calls(), vec![ProviderCall::RunCommand("echo".into())]);
        }
    }

    #[tokio::test]
    async fn concurrent_executions_are_independent() {
        let (exec, provider) = executor();
        let a = Action::new("a", vec![Step::Delay { duration_ms: 10.0 }, text("a", None)]);
        let b = Action::new("b", vec![shortcut(&[])]);
        let (ra, rb) = tokio::join!(exec.execute(&a), exec.execute(&b));
        assert!(ra.success);
        assert_eq!(error_of(&rb).code, ErrorCode::InvalidStepPayload);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn provider_error_chain_lands_in_details() {
        struct Broken;

        #[async_trait::async_trait]
        impl CapabilityProvider for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }
            async fn execute_shortcut(&self, _keys: Vec<String>) -> anyhow::Result<()> {
                Err(ProviderError::UnknownKey("hyper".into()).into())
            }
            async fn type_text(&self, _text: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn run_command(&self, _line: &str) -> anyhow::Result<()> {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no shell").into())
            }
            async fn delay(&self, _d: Duration) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let exec = ActionExecutor::new(Arc::new(Broken));
        let err = error_of(&exec.execute(&Action::new("b", vec![command("ls", None)])).await);
        let details = err.details.unwrap();
        assert_eq!(details["name"], "IoError");
        assert_eq!(details["message"], "no shell");

        let err = error_of(&exec.execute(&Action::new("b", vec![shortcut(&["hyper"])])).await);
        assert_eq!(err.details.unwrap()["name"], "ProviderError");
    }
}
