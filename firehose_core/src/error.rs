use thiserror::Error;

#[derive(Error, Debug)]
pub enum FirehoseError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported event type: {0}")]
    UnsupportedEventType(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FirehoseError>;
