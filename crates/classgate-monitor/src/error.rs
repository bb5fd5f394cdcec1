//! Error types for the monitor layer.

/// Errors that can occur when starting a monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Monitors spawn timer tasks and need a Tokio runtime to do so.
    #[error("{0} must be started from within a Tokio runtime")]
    NoRuntime(&'static str),
}
