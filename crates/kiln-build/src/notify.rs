//! Notification sink for failures that must not stop the process.

/// Receives failure notifications from tasks.
///
/// Stylesheet errors always go here, and so do failures of watch-triggered
/// rebuilds. Implementations must not panic.
pub trait Notifier: Send + Sync {
    /// Report a failure. `title` names the task, `message` the error.
    fn notify(&self, title: &str, message: &str);
}

/// Notifier that writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::error!("{}: {}", title, message);
    }
}
