//! Error types for insp-historial
//!
//! Top-level load failures surface to the caller; per-id hydration failures
//! never reach this type (they are reported through `HydrationReport`).

use std::time::Duration;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum HistorialError {
    /// Request could not be sent or the connection failed
    #[error("Network error calling {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    /// Request exceeded its time budget
    #[error("Request to {endpoint} timed out after {}s", .after.as_secs_f32())]
    Timeout { endpoint: String, after: Duration },

    /// Request was cancelled by its caller
    #[error("Request to {endpoint} was cancelled")]
    Cancelled { endpoint: String },

    /// Backend answered with a non-2xx status
    #[error("HTTP {status} from {endpoint}: {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Client construction or configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// insp-common error
    #[error("Common error: {0}")]
    Common(#[from] insp_common::Error),
}

impl HistorialError {
    /// Whether a fresh load may succeed where this one failed
    ///
    /// Drives the retry action shown for a failed load. Client errors (4xx)
    /// other than 408/429 will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            HistorialError::Network { .. } | HistorialError::Timeout { .. } => true,
            HistorialError::Http { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            HistorialError::Cancelled { .. }
            | HistorialError::Decode { .. }
            | HistorialError::Config(_)
            | HistorialError::Common(_) => false,
        }
    }
}

/// Result type for pipeline operations
pub type HistorialResult<T> = Result<T, HistorialError>;
