//! Error handling for the room exporter.

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// The main error type for the exporter.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Startup configuration was invalid or incomplete
    #[error(transparent)]
    Config(#[from] crate::sensor::config::ConfigError),

    /// Hardware access failed (only available with the hardware feature)
    #[cfg(feature = "hardware")]
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// Hardware access failed
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Metrics encoding error
    #[error("Metrics encoding error: {0}")]
    Metrics(String),
}

impl ExporterError {
    /// Create a new hardware error
    pub fn hardware_error(msg: impl Into<String>) -> Self {
        Self::Hardware(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new metrics encoding error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }
}
