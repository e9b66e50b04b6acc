//! Errors shared across crates
//!
//! Configuration problems are reported with the offending field path, e.g.
//! `inputs[livox/lidar].max_wait_for_pose`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// A transport source could not be attached to its input
    #[error("pointcloud source '{topic}': {message}")]
    Source { topic: String, message: String },

    // ===== Debug Sink Errors =====
    #[error("debug sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    #[error("debug sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Source attachment error
    pub fn source_error(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
