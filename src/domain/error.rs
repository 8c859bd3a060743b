use thiserror::Error;

use crate::domain::validation::ValidationErrors;

/// Why a raw payload did not yield a valid order.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("order payload could not be decoded: {message}")]
    Decode { message: String },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl DomainError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}
