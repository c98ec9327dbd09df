//! Operator notifications.
//!
//! The store reports every confirmed mutation and every fall back to
//! local-only data through a [`Notifier`], so an operator can tell a change
//! that only landed locally from one every reader can see.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
            Self::Warning => "warning",
        };
        f.write_str(label)
    }
}

/// Fire-and-forget sink for operator-facing messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);

    fn success(&self, message: &str) {
        self.notify(message, Severity::Success);
    }

    fn error(&self, message: &str) {
        self.notify(message, Severity::Error);
    }

    fn info(&self, message: &str) {
        self.notify(message, Severity::Info);
    }

    fn warning(&self, message: &str) {
        self.notify(message, Severity::Warning);
    }
}

/// Routes notifications into the tracing pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Success | Severity::Info => tracing::info!(%severity, "{message}"),
            Severity::Warning => tracing::warn!(%severity, "{message}"),
            Severity::Error => tracing::error!(%severity, "{message}"),
        }
    }
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _message: &str, _severity: Severity) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(Severity::Success.to_string(), "success");
    }
}
