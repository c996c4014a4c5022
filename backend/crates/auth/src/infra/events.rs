//! Event publisher that writes CloudEvents envelopes to the log.
//!
//! Stands in for a message broker; swap in a broker-backed
//! [`EventPublisher`] without touching the use cases.

use crate::domain::entity::event::DomainEvent;
use crate::domain::repository::EventPublisher;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Default)]
pub struct LogEventPublisher;

impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> AuthResult<()> {
        let envelope = serde_json::to_string(&event.envelope())
            .map_err(|e| AuthError::Internal(format!("Failed to encode event: {e}")))?;

        tracing::info!(
            target: "auth::events",
            event_type = event.event_type(),
            envelope = %envelope,
            "Domain event published"
        );

        Ok(())
    }
}
