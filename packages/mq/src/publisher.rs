use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{MqAppConfig, Notification};
use tracing::debug;

use crate::error::MqError;
use crate::models::MqQueue;

/// Outbound side of the transport.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `payload` to every subscriber of `destination`.
    async fn publish(&self, destination: &str, payload: &serde_json::Value) -> Result<(), MqError>;

    async fn notify(&self, notification: &Notification) -> Result<(), MqError> {
        let payload = notification.payload()?;
        self.publish(notification.destination(), &payload).await
    }
}

/// Publishes through the broker, copying each message to every queue bound
/// to the destination.
pub struct BrokerPublisher {
    mq: Arc<MqQueue>,
    config: MqAppConfig,
}

impl BrokerPublisher {
    pub fn new(mq: Arc<MqQueue>, config: MqAppConfig) -> Self {
        Self { mq, config }
    }
}

#[async_trait]
impl Publisher for BrokerPublisher {
    async fn publish(&self, destination: &str, payload: &serde_json::Value) -> Result<(), MqError> {
        for queue in self.config.queues_for(destination) {
            self.mq.publish(&queue, None, payload, None).await?;
            debug!(destination, queue = %queue, "Published message");
        }
        Ok(())
    }
}

/// Keeps published messages in memory, in publication order.
#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far as `(destination, payload)` pairs.
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Destinations published so far, in order.
    pub fn destinations(&self) -> Vec<String> {
        self.published().into_iter().map(|(d, _)| d).collect()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, destination: &str, payload: &serde_json::Value) -> Result<(), MqError> {
        self.published
            .lock()
            .map_err(|e| MqError::Internal(e.to_string()))?
            .push((destination.to_string(), payload.clone()));
        Ok(())
    }
}
