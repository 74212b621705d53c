//! Platform errors

/// Result type alias for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors reported by a [`Platform`](crate::Platform)
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device open failed: {0}")]
    DeviceOpen(String),

    #[error("Route setup failed: {0}")]
    Route(String),

    #[error("Operation not supported on {platform}: {operation}")]
    NotSupported {
        platform: String,
        operation: &'static str,
    },
}

impl PlatformError {
    pub fn not_supported(platform: impl Into<String>, operation: &'static str) -> Self {
        PlatformError::NotSupported {
            platform: platform.into(),
            operation,
        }
    }
}
