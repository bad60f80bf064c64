#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Stepbot: validated, strictly sequential execution of UI-automation actions.
//!
//! An action is an ordered list of steps (shortcut, text, command, delay). The
//! executor validates each step, lowers it to a capability provider and reports
//! one `ExecutionResult` per action without ever returning an error. Modules:
//! - `config`: Action/step models, run configuration, loader and schema helpers.
//! - `error`: The error taxonomy and its string encoding.
//! - `executor`: The action executor and its result type.
//! - `provider`: Capability providers (Enigo desktop input, recording fake).

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: execution errors and provider errors.
pub mod error;
/// Public module: execution engine (executor and results).
pub mod executor;
/// Public module: capability providers.
pub mod provider;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a plain level name (trace|debug|info|warn|error).
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(tracing::Level::INFO);
    init_tracing_with_level(level);
}

/// Initialize tracing at an explicit level. Ignored if a subscriber is already set.
pub fn init_tracing_with_level(level: tracing::Level) {
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}
