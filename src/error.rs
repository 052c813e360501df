use thiserror::Error;

/// Startup liveness probe failed. Non-fatal: the session stays disconnected.
#[derive(Debug, Clone, Error)]
#[error("connection check failed: {0}")]
pub struct ConnectionError(pub String);

/// A single status query failed. The poller skips the tick and keeps going.
#[derive(Debug, Clone, Error)]
#[error("status query failed: {0}")]
pub struct TransientError(pub String);

/// The in-flight command failed. Displays as the bare backend message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Reasons `send()` refuses to dispatch. Neither variant changes session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("nothing to send: command text is empty and no attachment is staged")]
    EmptyCommand,
    #[error("a command is already in flight")]
    Busy,
}
