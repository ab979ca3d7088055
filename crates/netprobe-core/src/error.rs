//! Error types for the network probe
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the network probe
#[derive(Error, Debug)]
pub enum Error {
    /// Address resolution over HTTP failed (request, connection, status or body read)
    #[error("Network error: {0}")]
    Network(String),

    /// The current address could not be turned into a probe target
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The ICMP prober could not be constructed
    #[error("Probe initialization error: {0}")]
    ProbeInit(String),

    /// Every probe attempt failed
    #[error("Probe exhausted after {attempts} attempt(s) to {target}: {message}")]
    ProbeExhausted {
        /// Probed address
        target: String,
        /// Number of attempts made
        attempts: u32,
        /// Failure reported by the last attempt
        message: String,
    },

    /// Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (listener binding, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a probe initialization error
    pub fn probe_init(msg: impl Into<String>) -> Self {
        Self::ProbeInit(msg.into())
    }

    /// Create a probe exhaustion error
    pub fn probe_exhausted(
        target: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::ProbeExhausted {
            target: target.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from the latency prober itself
    ///
    /// These are the errors the probe failure policy applies to.
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, Self::ProbeInit(_) | Self::ProbeExhausted { .. })
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
