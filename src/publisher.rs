//! Best-effort order event publication.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::OrderEvent;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("event channel unavailable: {0}")]
    Transport(String),
}

/// Hands a serialized event to an external channel. One attempt, no retry,
/// no acknowledgment; the placement engine logs a failure and moves on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, subject: &str, event: &OrderEvent) -> Result<(), PublishError>;
}

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, subject: &str, event: &OrderEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|err| PublishError::Transport(err.to_string()))?;
        // Publishes are buffered; flush forces the attempt now.
        self.client
            .flush()
            .await
            .map_err(|err| PublishError::Transport(err.to_string()))?;
        tracing::debug!(subject, event_id = %event.event_id, "order event published");
        Ok(())
    }
}

/// Fallback when no event channel is configured: events only hit the log.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, subject: &str, event: &OrderEvent) -> Result<(), PublishError> {
        tracing::info!(
            subject,
            event = %serde_json::to_string(event)?,
            "order event (no channel configured)"
        );
        Ok(())
    }
}
