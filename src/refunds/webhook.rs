//! Notification collaborator.
//!
//! The transport (queueing, retries, delivery) lives outside this core.
//! Dispatch failures are captured and logged, never propagated: a webhook
//! failure must not corrupt or roll back already-committed refund state.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::observability::metrics;

/// Emitted when a refund has been broadcast and persisted as PROCESSING.
pub const EVENT_REFUND_PROCESSING: &str = "refund.processing";

/// Emitted exactly once, when a refund reaches finality.
pub const EVENT_REFUND_COMPLETED: &str = "refund.completed";

/// Error from the webhook transport.
#[derive(Debug, Error)]
#[error("webhook dispatch failed: {0}")]
pub struct WebhookError(pub String);

/// Queues a webhook event for delivery.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    async fn queue_webhook(&self, event: &str, payload: Value) -> Result<(), WebhookError>;
}

/// Queue an event, swallowing and logging transport failures.
pub async fn dispatch(dispatcher: &dyn WebhookDispatcher, event: &str, payload: Value) {
    metrics::record_webhook(event);
    match dispatcher.queue_webhook(event, payload).await {
        Ok(()) => {
            tracing::debug!(event = event, "Webhook queued");
        }
        Err(e) => {
            tracing::error!(event = event, error = %e, "Webhook dispatch failed; refund state unaffected");
        }
    }
}

/// Dispatcher that only logs. Default for deployments without a webhook
/// transport wired in.
pub struct LoggingDispatcher;

#[async_trait]
impl WebhookDispatcher for LoggingDispatcher {
    async fn queue_webhook(&self, event: &str, payload: Value) -> Result<(), WebhookError> {
        tracing::info!(event = event, payload = %payload, "Webhook event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct FailingDispatcher;

    #[async_trait]
    impl WebhookDispatcher for FailingDispatcher {
        async fn queue_webhook(&self, _event: &str, _payload: Value) -> Result<(), WebhookError> {
            Err(WebhookError("queue full".to_string()))
        }
    }

    struct RecordingDispatcher {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebhookDispatcher for RecordingDispatcher {
        async fn queue_webhook(&self, event: &str, _payload: Value) -> Result<(), WebhookError> {
            self.events.lock().unwrap().push(event.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        // Must not panic or propagate.
        dispatch(&FailingDispatcher, EVENT_REFUND_PROCESSING, json!({})).await;
    }

    #[tokio::test]
    async fn test_dispatch_forwards_event() {
        let dispatcher = RecordingDispatcher {
            events: Mutex::new(Vec::new()),
        };
        dispatch(
            &dispatcher,
            EVENT_REFUND_COMPLETED,
            json!({"status": "COMPLETED"}),
        )
        .await;
        assert_eq!(
            dispatcher.events.lock().unwrap().as_slice(),
            &[EVENT_REFUND_COMPLETED.to_string()]
        );
    }
}
