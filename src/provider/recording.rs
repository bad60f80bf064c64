//! In-memory provider that records every primitive call.
//!
//! Useful for tests and for exercising action lists without a desktop session.
//! Failures can be scripted per call number or per primitive.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::trace;

use super::CapabilityProvider;
use crate::error::ProviderError;

/// One recorded primitive invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Shortcut(Vec<String>),
    TypeText(String),
    RunCommand(String),
    Delay(Duration),
}

impl ProviderCall {
    fn primitive(&self) -> Primitive {
        match self {
            ProviderCall::Shortcut(_) => Primitive::Shortcut,
            ProviderCall::TypeText(_) => Primitive::TypeText,
            ProviderCall::RunCommand(_) => Primitive::RunCommand,
            ProviderCall::Delay(_) => Primitive::Delay,
        }
    }
}

/// Primitive selector for scripted failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    Shortcut,
    TypeText,
    RunCommand,
    Delay,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<ProviderCall>,
    fail_on_call: Option<usize>,
    fail_primitives: HashSet<Primitive>,
}

/// Provider that records calls instead of performing them.
///
/// Delays really sleep so timing assertions hold.
#[derive(Debug, Default)]
pub struct RecordingProvider {
    state: Mutex<State>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the call with this zero-based sequence number (failed calls are still recorded).
    pub fn fail_on_call(self, call: usize) -> Self {
        self.with_state(|s| s.fail_on_call = Some(call));
        self
    }

    /// Fail every call of the given primitive.
    pub fn fail_primitive(self, primitive: Primitive) -> Self {
        self.with_state(|s| {
            s.fail_primitives.insert(primitive);
        });
        self
    }

    /// Snapshot of every call received so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn call_count(&self) -> usize {
        self.with_state(|s| s.calls.len())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        // A panic while holding the lock leaves plain data behind; keep using it.
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn record(&self, call: ProviderCall) -> Result<()> {
        trace!(target: "stepbot::provider", ?call, "recorded");
        let primitive = call.primitive();
        self.with_state(|s| {
            let seq = s.calls.len();
            s.calls.push(call);
            if s.fail_on_call == Some(seq) || s.fail_primitives.contains(&primitive) {
                Err(ProviderError::Scripted { call: seq }.into())
            } else {
                Ok(())
            }
        })
    }
}

#[async_trait]
impl CapabilityProvider for RecordingProvider {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn execute_shortcut(&self, keys: Vec<String>) -> Result<()> {
        self.record(ProviderCall::Shortcut(keys))
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.record(ProviderCall::TypeText(text.to_owned()))
    }

    async fn run_command(&self, command_line: &str) -> Result<()> {
        self.record(ProviderCall::RunCommand(command_line.to_owned()))
    }

    async fn delay(&self, duration: Duration) -> Result<()> {
        self.record(ProviderCall::Delay(duration))?;
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let p = RecordingProvider::new();
        p.execute_shortcut(vec!["ctrl".into(), "c".into()])
            .await
            .unwrap();
        p.type_text("x").await.unwrap();
        p.run_command("ls").await.unwrap();
        p.delay(Duration::from_millis(1)).await.unwrap();

        assert_eq!(
            p.calls(),
            vec![
                ProviderCall::Shortcut(vec!["ctrl".into(), "c".into()]),
                ProviderCall::TypeText("x".into()),
                ProviderCall::RunCommand("ls".into()),
                ProviderCall::Delay(Duration::from_millis(1)),
            ]
        );
    }

    #[tokio::test]
    async fn scripted_failures() {
        let p = RecordingProvider::new().fail_on_call(1);
        assert!(p.type_text("a").await.is_ok());
        assert!(p.type_text("b").await.is_err());
        assert!(p.type_text("c").await.is_ok());
        assert_eq!(p.call_count(), 3);

        let p = RecordingProvider::new().fail_primitive(Primitive::RunCommand);
        assert!(p.type_text("a").await.is_ok());
        let err = p.run_command("ls").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Scripted { call: 1 })
        ));
    }
}
