//! Error types for pgprobe.
//!
//! Every stage of a probe run fails with a [`ProbeError`]; the variant tells
//! the operator which stage broke.

use thiserror::Error;

/// Main error type for pgprobe operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The configuration file could not be opened or read.
    #[error("Cannot read configuration file {path}: {message}")]
    ConfigIo { path: String, message: String },

    /// Configuration errors (malformed file, missing required key, etc.)
    #[error("{0}")]
    Config(String),

    /// The connection URL does not have the `scheme://host[:port]/...` shape.
    #[error("URL parsing failed: {0}")]
    UrlParse(String),

    /// An explicit port outside 1-65535.
    #[error("Port number out of range: {0}")]
    PortRange(String),

    /// Reachability failures (host not answering, port closed).
    #[error("{0}")]
    Network(String),

    /// Database connection errors (refused, auth failed, unknown database, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, permission errors, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Writing the report failed.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Creates a configuration I/O error for the given path.
    pub fn config_io(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ConfigIo {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a URL parse error with the given message.
    pub fn url_parse(msg: impl Into<String>) -> Self {
        Self::UrlParse(msg.into())
    }

    /// Creates a port range error for the offending port text.
    pub fn port_range(port: impl Into<String>) -> Self {
        Self::PortRange(port.into())
    }

    /// Creates a network reachability error with the given message.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Returns the error category as a string for log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigIo { .. } | Self::Config(_) => "Configuration Error",
            Self::UrlParse(_) | Self::PortRange(_) => "URL Error",
            Self::Network(_) => "Network Error",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Io(_) => "Output Error",
        }
    }
}

/// Result type alias using ProbeError.
pub type Result<T> = std::result::Result<T, ProbeError>;
