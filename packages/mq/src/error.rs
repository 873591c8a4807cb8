use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<broccoli_queue::error::BroccoliError> for MqError {
    fn from(e: broccoli_queue::error::BroccoliError) -> Self {
        MqError::Internal(e.to_string())
    }
}

/// Failure of a message handler, classified by what the transport should do.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message can never be processed. Acknowledged and dropped.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Infrastructure failure. The message is rejected so it is redelivered.
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl HandlerError {
    pub fn malformed(e: impl std::fmt::Display) -> Self {
        HandlerError::Malformed(e.to_string())
    }

    pub fn transient(e: impl std::fmt::Display) -> Self {
        HandlerError::Transient(e.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}
