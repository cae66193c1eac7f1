//! Install result publishing

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Result, WorkerError};
use crate::messages::InstallResult;

/// Destination for install results
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn publish(&self, result: &InstallResult) -> Result<()>;
}

/// Publishes results to a queue through the default exchange
pub struct AmqpResultPublisher {
    channel: Channel,
    queue: String,
    timeout: Duration,
}

impl AmqpResultPublisher {
    pub fn new(channel: Channel, queue: impl Into<String>, timeout: Duration) -> Self {
        Self {
            channel,
            queue: queue.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ResultPublisher for AmqpResultPublisher {
    async fn publish(&self, result: &InstallResult) -> Result<()> {
        let body = result.to_body()?;
        let properties = BasicProperties::default().with_content_type("application/json".into());

        let send = async {
            self.channel
                .basic_publish(
                    "",
                    &self.queue,
                    BasicPublishOptions::default(),
                    &body,
                    properties,
                )
                .await?
                .await?;
            Ok::<_, lapin::Error>(())
        };

        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| WorkerError::Timeout {
                operation: "publish",
                timeout: self.timeout,
            })??;

        tracing::debug!(
            deployment_id = result.deployment_id,
            success = result.success,
            queue = %self.queue,
            "install result published"
        );
        Ok(())
    }
}

/// Keeps published results in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<InstallResult>>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every publish
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every result published so far, in order
    pub fn published(&self) -> Vec<InstallResult> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ResultPublisher for RecordingPublisher {
    async fn publish(&self, result: &InstallResult) -> Result<()> {
        if self.fail {
            return Err(WorkerError::Timeout {
                operation: "publish",
                timeout: Duration::ZERO,
            });
        }
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_publisher_keeps_order() {
        let publisher = RecordingPublisher::new();
        publisher.publish(&InstallResult::success(1)).await.unwrap();
        publisher.publish(&InstallResult::failure(2, "x")).await.unwrap();

        let ids: Vec<_> = publisher.published().iter().map(|r| r.deployment_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failing_publisher() {
        let publisher = RecordingPublisher::failing();
        assert!(publisher.publish(&InstallResult::success(1)).await.is_err());
        assert!(publisher.published().is_empty());
    }
}
