//! Error types for the core module

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Server or transport error
    #[error("Client error: {0}")]
    ClientError(#[from] trapline_client::ClientError),

    /// Message not in the store
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Desktop notification could not be shown
    #[error("Notification error: {0}")]
    NotificationError(String),

    /// Notifications were blocked by the user or platform
    #[error("Notifications are not permitted; allow them in the system settings")]
    PermissionDenied,

    /// Preferences could not be read or written
    #[error("Settings error: {0}")]
    SettingsError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::SettingsError(e.to_string())
    }
}
