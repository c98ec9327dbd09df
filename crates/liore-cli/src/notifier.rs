use liore_core::notify::{Notifier, Severity};

/// Prints store notifications to stderr.
///
/// In quiet mode only errors get through.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier {
    quiet: bool,
}

impl TerminalNotifier {
    pub const fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if self.quiet && severity != Severity::Error {
            return;
        }
        eprintln!("{}", format_notification(message, severity));
    }
}

pub fn format_notification(message: &str, severity: Severity) -> String {
    let label = match severity {
        Severity::Success => "ok",
        Severity::Error => "error",
        Severity::Info => "info",
        Severity::Warning => "warn",
    };
    format!("[{label}] {message}")
}
