//! Error types for pipeline orchestration.

use thiserror::Error;

/// Errors raised while assembling or running the pipeline
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// An input could not be wired into the pipeline
    #[error("Failed to set up input '{topic}': {message}")]
    InputSetup { topic: String, message: String },

    /// A dispatcher task ended abnormally
    #[error("Dispatcher for '{topic}' failed: {message}")]
    DispatcherTask { topic: String, message: String },

    /// Contract / configuration errors from the library crates
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    #[error(transparent)]
    Dispatcher(#[from] dispatcher::DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn input_setup(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputSetup {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn dispatcher_task(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DispatcherTask {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
