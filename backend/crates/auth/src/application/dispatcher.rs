//! Side-effect dispatcher
//!
//! Use cases hand domain events and audit entries to a bounded queue and
//! return immediately. A background worker drains the queue, publishing
//! events through an [`EventPublisher`] and appending audit entries through
//! an [`AuditRepository`]. Failures are logged and dropped; they never reach
//! the request that caused them.
//!
//! When the queue is full new side effects are dropped with a warning rather
//! than applying backpressure to request handlers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::entity::{audit::AuditEntry, event::DomainEvent};
use crate::domain::repository::{AuditRepository, EventPublisher};

#[derive(Debug, Clone)]
pub enum SideEffect {
    Event(DomainEvent),
    Audit(AuditEntry),
}

impl SideEffect {
    fn kind(&self) -> &'static str {
        match self {
            SideEffect::Event(event) => event.event_type(),
            SideEffect::Audit(entry) => entry.event_type.as_str(),
        }
    }
}

/// Sending half, cloned into every use case.
#[derive(Debug, Clone)]
pub struct SideEffectDispatcher {
    tx: mpsc::Sender<SideEffect>,
}

impl SideEffectDispatcher {
    /// Create a dispatcher and the receiver its worker consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SideEffect>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting.
    pub fn emit(&self, effect: SideEffect) {
        match self.tx.try_send(effect) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(effect)) => {
                tracing::warn!(kind = effect.kind(), "Side-effect queue full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(effect)) => {
                tracing::warn!(kind = effect.kind(), "Side-effect worker stopped, dropping");
            }
        }
    }

    pub fn event(&self, event: DomainEvent) {
        self.emit(SideEffect::Event(event));
    }

    pub fn audit(&self, entry: AuditEntry) {
        self.emit(SideEffect::Audit(entry));
    }
}

/// Spawn the worker draining `rx`. It exits once every dispatcher is dropped.
pub fn spawn_side_effect_worker<A, P>(
    mut rx: mpsc::Receiver<SideEffect>,
    audit: Arc<A>,
    publisher: Arc<P>,
) -> JoinHandle<()>
where
    A: AuditRepository + Sync + 'static,
    P: EventPublisher + Sync + 'static,
{
    tokio::spawn(async move {
        while let Some(effect) = rx.recv().await {
            match &effect {
                SideEffect::Event(event) => {
                    if let Err(e) = publisher.publish(event).await {
                        tracing::warn!(
                            error = %e,
                            event_type = event.event_type(),
                            user_id = %event.user_id(),
                            "Failed to publish domain event"
                        );
                    }
                }
                SideEffect::Audit(entry) => {
                    if let Err(e) = audit.append(entry).await {
                        tracing::warn!(
                            error = %e,
                            event_type = %entry.event_type,
                            "Failed to write audit log entry"
                        );
                    }
                }
            }
        }
        tracing::debug!("Side-effect worker stopped");
    })
}
