use anyhow::{Context, Result};
use async_trait::async_trait;
use enigo::{Direction, Enigo, Key, Keyboard as _, Settings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, trace, warn};

use super::CapabilityProvider;
use crate::error::ProviderError;
use crate::executor::result::whole_millis;

/// Real desktop input through Enigo, commands through the platform shell.
///
/// In dry-run mode input and commands are only logged. Delays still wait, so a
/// dry run takes as long as the real one.
pub struct DesktopProvider {
    dry_run: AtomicBool,
}

impl DesktopProvider {
    /// Create a new provider.
    /// - dry_run: when true, only logs instead of simulating real input.
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run: AtomicBool::new(dry_run),
        }
    }

    /// Returns whether the provider is currently in dry-run mode.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Relaxed)
    }

    /// Enable or disable dry-run mode dynamically.
    pub fn set_dry_run(&self, dry_run: bool) {
        self.dry_run.store(dry_run, Ordering::Relaxed);
    }
}

impl Default for DesktopProvider {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl CapabilityProvider for DesktopProvider {
    fn name(&self) -> &'static str {
        "desktop"
    }

    async fn execute_shortcut(&self, keys: Vec<String>) -> Result<()> {
        let parsed = parse_combination(&keys)?;
        if self.is_dry_run() {
            info!(target: "stepbot::provider", ?keys, "DRY-RUN shortcut");
            return Ok(());
        }
        trace!(target: "stepbot::provider", ?keys, "shortcut");
        with_enigo("shortcut", move |enigo| press_combination(enigo, &parsed))
            .await
            .with_context(|| format!("shortcut {} failed", keys.join("+")))
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        if self.is_dry_run() {
            info!(target: "stepbot::provider", %text, "DRY-RUN type_text");
            return Ok(());
        }
        trace!(target: "stepbot::provider", chars = text.chars().count(), "type_text");
        let owned = text.to_owned();
        with_enigo("type_text", move |enigo| {
            enigo
                .text(&owned)
                .map_err(|e| ProviderError::Input(e.to_string()).into())
        })
        .await
    }

    async fn run_command(&self, command_line: &str) -> Result<()> {
        if self.is_dry_run() {
            info!(target: "stepbot::provider", %command_line, "DRY-RUN run_command");
            return Ok(());
        }
        trace!(target: "stepbot::provider", %command_line, "run_command");

        let output = shell(command_line)
            .output()
            .await
            .with_context(|| format!("Failed to spawn shell for `{command_line}`"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            info!(target: "stepbot::provider", %command_line, "{}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            warn!(target: "stepbot::provider", %command_line, "{}", stderr.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(ProviderError::CommandFailed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into())
        }
    }

    async fn delay(&self, duration: Duration) -> Result<()> {
        trace!(target: "stepbot::provider", ms = whole_millis(duration), "delay");
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

#[cfg(windows)]
fn shell(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command_line);
    cmd
}

#[cfg(not(windows))]
fn shell(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

/// Run `f` against a fresh Enigo handle on the blocking pool.
async fn with_enigo<F>(op: &'static str, f: F) -> Result<()>
where
    F: FnOnce(&mut Enigo) -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        trace!(target: "stepbot::provider", op, "Initializing Enigo");
        let mut enigo = Enigo::new(&Settings::default()).context("Failed to initialize Enigo")?;
        f(&mut enigo)
    })
    .await
    .with_context(|| format!("{op} input task did not complete"))?
}

/// Press keys in order, release in reverse. Keys pressed before a failure are still released.
fn press_combination(enigo: &mut Enigo, keys: &[Key]) -> Result<()> {
    let mut pressed = Vec::with_capacity(keys.len());
    let mut outcome: Result<()> = Ok(());

    for key in keys {
        match enigo.key(*key, Direction::Press) {
            Ok(()) => pressed.push(*key),
            Err(e) => {
                outcome = Err(ProviderError::Input(format!("press {key:?}: {e}")).into());
                break;
            }
        }
    }

    for key in pressed.iter().rev() {
        if let Err(e) = enigo.key(*key, Direction::Release) {
            warn!(target: "stepbot::provider", ?key, error = %e, "Failed to release key");
            if outcome.is_ok() {
                outcome = Err(ProviderError::Input(format!("release {key:?}: {e}")).into());
            }
        }
    }

    outcome
}

fn parse_combination(keys: &[String]) -> Result<Vec<Key>, ProviderError> {
    if keys.is_empty() {
        return Err(ProviderError::EmptyShortcut);
    }
    keys.iter().map(String::as_str).map(parse_key).collect()
}

/// Map a human key name to an Enigo key. Names are case-insensitive; a single
/// character maps to itself (lowercased, so `S` and `s` are the same key).
pub fn parse_key(name: &str) -> Result<Key, ProviderError> {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();

    let key = match lower.as_str() {
        "ctrl" | "control" => Key::Control,
        "shift" => Key::Shift,
        "alt" | "option" => Key::Alt,
        "meta" | "win" | "windows" | "cmd" | "command" | "super" => Key::Meta,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "delete" | "del" => Key::Delete,
        "backspace" => Key::Backspace,
        "escape" | "esc" => Key::Escape,
        "space" => Key::Space,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "capslock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return Err(ProviderError::UnknownKey(trimmed.to_string())),
            }
        }
    };
    Ok(key)
}
