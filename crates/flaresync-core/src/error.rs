//! Error types for flaresync
//!
//! Every fallible operation in the workspace returns [`Result`]. The engine
//! never aborts on these errors; it logs them and retries on the next cycle.

use thiserror::Error;

/// Result type alias for flaresync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Public IP lookup failed
    #[error("IP source error: {0}")]
    IpSource(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from loading or validating configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Toml(_))
    }
}
