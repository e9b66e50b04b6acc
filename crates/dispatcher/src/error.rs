//! Dispatcher error types
//!
//! Only construction can fail. The drain pass itself never returns an error:
//! rejected clouds are logged and counted.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured debug output could not be opened
    #[error("failed to create debug sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Clouds cannot be posed in an unnamed frame
    #[error("world frame must not be empty (input '{topic}')")]
    EmptyWorldFrame { topic: String },

    #[error("invalid input configuration: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
