//! Injectable diagnostics port
//!
//! The engine never prints; developer-facing diagnostics flow through this
//! trait so tests can observe them without capturing logs.

use std::sync::Mutex;

/// Observer for engine diagnostics
pub trait Telemetry: Send + Sync {
    /// Developer-facing diagnostic line
    fn debug(&self, message: &str);

    /// Recoverable fault worth surfacing in logs
    fn warn(&self, message: &str);
}

/// Forwards diagnostics to the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }
}

/// Records diagnostics for assertions in tests
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    messages: Mutex<Vec<String>>,
}

impl RecordingTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in order
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn push(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.to_string());
    }
}

impl Telemetry for RecordingTelemetry {
    fn debug(&self, message: &str) {
        self.push(message);
    }

    fn warn(&self, message: &str) {
        self.push(message);
    }
}
