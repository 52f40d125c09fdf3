use async_trait::async_trait;
use orgshare_common::{AssumedCredentials, QueuedCredentials};

pub mod error;
pub mod sqs;

pub use error::QueueError;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Queue metrics for monitoring
#[derive(Debug, Clone, Default)]
pub struct QueueMetrics {
    /// Approximate number of messages visible in the queue (pending)
    pub pending_messages: u64,
    /// Approximate number of messages currently being processed (in-flight)
    pub in_flight_messages: u64,
    /// Queue identifier
    pub queue_identifier: String,
    /// Total messages polled from this queue
    pub total_polled: u64,
    /// Total messages successfully acknowledged (consumed)
    pub total_acked: u64,
    /// Total messages negatively acknowledged (failed/redelivered)
    pub total_nacked: u64,
}

/// Trait for consuming credential messages from a queue
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Unique identifier for this consumer
    fn identifier(&self) -> &str;

    /// Poll for messages from the queue
    async fn poll(&self, max_messages: u32) -> Result<Vec<QueuedCredentials>>;

    /// Acknowledge a message (remove from queue)
    async fn ack(&self, receipt_handle: &str) -> Result<()>;

    /// Negative acknowledge a message (make visible again after delay)
    async fn nack(&self, receipt_handle: &str, delay_seconds: Option<u32>) -> Result<()>;

    /// Check if the consumer is healthy
    fn is_healthy(&self) -> bool;

    /// Stop the consumer
    async fn stop(&self);

    /// Queue metrics (pending/in-flight counts).
    /// Returns None if metrics are not available for this queue type.
    async fn get_metrics(&self) -> Result<Option<QueueMetrics>> {
        Ok(None)
    }
}

/// Trait for publishing credential messages to a queue
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// The queue identifier
    fn identifier(&self) -> &str;

    /// Publish one credential payload, returning the broker message id
    async fn publish(&self, payload: &AssumedCredentials) -> Result<String>;
}
