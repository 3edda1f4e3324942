// crates/engine/src/adapters/logging.rs

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
  Trace,
  Info,
  Warning,
  Error,
}

/// Application log sink. The engine logs through `tracing` internally; this
/// delegate additionally receives audit-relevant records when installed.
pub trait LoggerDelegate: Send + Sync {
  /// Called once before any writes; `storage_path` is where the application
  /// may keep its log files.
  fn init(&self, storage_path: &Path);
  fn write(&self, level: LogLevel, message: &str, target: &str);
  fn flush(&self);
}

/// Forwards delegate writes to the `tracing` subscriber. Useful as a default
/// when the application has no sink of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl LoggerDelegate for TracingLogger {
  fn init(&self, storage_path: &Path) {
    tracing::debug!(path = %storage_path.display(), "logger initialized");
  }

  fn write(&self, level: LogLevel, message: &str, target: &str) {
    match level {
      LogLevel::Trace => tracing::trace!(origin = target, "{message}"),
      LogLevel::Info => tracing::info!(origin = target, "{message}"),
      LogLevel::Warning => tracing::warn!(origin = target, "{message}"),
      LogLevel::Error => tracing::error!(origin = target, "{message}"),
    }
  }

  fn flush(&self) {}
}
