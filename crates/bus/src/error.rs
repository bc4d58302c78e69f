//! Collaborator bus errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Collaborator '{name}' failed: {reason}")]
    CollaboratorFailed { name: String, reason: String },

    #[error("Bus channel closed")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BusError {
    pub fn collaborator(name: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::CollaboratorFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
