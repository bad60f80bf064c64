/*!
Capability providers: the side of Stepbot that touches the operating system.

The executor only knows the [`CapabilityProvider`] trait. Implementations:

- `desktop.rs`   -> `DesktopProvider`   (Enigo keyboard input + platform shell, optional dry-run)
- `recording.rs` -> `RecordingProvider` (records calls, scriptable failures; for tests and demos)

Each primitive is asynchronous and fallible. Errors are plain `anyhow::Error`s;
the executor turns them into `STEP_EXECUTION_FAILED` results.
*/

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod desktop;
pub mod recording;

pub use desktop::DesktopProvider;
pub use recording::{Primitive, ProviderCall, RecordingProvider};

/// The four primitives an action step can be lowered to.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Press the keys in order, then release them.
    async fn execute_shortcut(&self, keys: Vec<String>) -> Result<()>;

    /// Type literal text.
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Run a complete command line through the platform shell.
    async fn run_command(&self, command_line: &str) -> Result<()>;

    /// Suspend for at least `duration`.
    async fn delay(&self, duration: Duration) -> Result<()>;
}
