use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Sink for terminal job events. Implementations must not block: the store
/// calls this while holding its lock.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, message: &str, severity: Severity, subject: Option<&str>);
}

/// Default notifier that forwards to the tracing pipeline.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity, subject: Option<&str>) {
        match severity {
            Severity::Info => info!(subject = subject.unwrap_or(""), "{message}"),
            Severity::Error => error!(subject = subject.unwrap_or(""), "{message}"),
        }
    }
}
