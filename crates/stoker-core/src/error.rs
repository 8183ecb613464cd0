use thiserror::Error;

/// Core error type for Stoker operations.
#[derive(Error, Debug)]
pub enum StokerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown priority label: {0}")]
    UnknownPriorityLabel(String),

    #[error("Connection to broker not established")]
    ConnectionNotEstablished,

    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("Job {0} not found on broker")]
    JobNotFound(u64),

    #[error("Unknown job class: {0}")]
    UnknownJobClass(String),

    #[error("Unknown method '{method}' on job class {class}")]
    UnknownJobMethod { class: String, method: String },

    #[error("No tubes configured for worker")]
    NoTubesConfigured,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Job error: {0}")]
    Job(String),

    #[error("Job timed out after {0}s")]
    Timeout(u64),
}

impl StokerError {
    /// Shorthand for an application-level job failure.
    pub fn job(message: impl Into<String>) -> Self {
        StokerError::Job(message.into())
    }

    /// Whether this error means the broker connection itself is gone.
    ///
    /// Workers stop on these; every other error is scoped to a single job.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StokerError::ConnectionNotEstablished | StokerError::BrokerUnavailable(_)
        )
    }

    /// Whether the failure happened before job logic could run
    /// (bad payload, unknown class or method).
    pub fn is_unrecoverable_payload(&self) -> bool {
        matches!(
            self,
            StokerError::Deserialization(_)
                | StokerError::UnknownJobClass(_)
                | StokerError::UnknownJobMethod { .. }
        )
    }
}

impl From<serde_json::Error> for StokerError {
    fn from(e: serde_json::Error) -> Self {
        StokerError::Serialization(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for StokerError {
    fn from(e: bincode::error::EncodeError) -> Self {
        StokerError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for StokerError {
    fn from(e: bincode::error::DecodeError) -> Self {
        StokerError::Deserialization(e.to_string())
    }
}

/// Result type alias using StokerError.
pub type Result<T> = std::result::Result<T, StokerError>;
