//! Error types for stakeout
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in stakeout
#[derive(Debug, Error)]
pub enum StakeoutError {
    /// Malformed watch definition, selector, regex, key, or certificate
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document inspection was requested with zero node inspectors
    #[error("No node inspectors configured")]
    NoInspectors,

    /// Document could not be fetched this tick
    #[error("Failed to load {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Notification could not be delivered
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Encryption, decryption, or key handling failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Message receiver setup or serving error
    #[error("Receiver error: {0}")]
    Receiver(String),

    /// The watch has no pending sentinel (stopped, or already awaited)
    #[error("Watch stopped: no pending sentinel")]
    WatchStopped,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for stakeout operations
pub type Result<T> = std::result::Result<T, StakeoutError>;
