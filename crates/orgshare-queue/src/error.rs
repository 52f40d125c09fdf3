use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue is stopped")]
    Stopped,

    #[error("AWS SQS error: {0}")]
    Sqs(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
