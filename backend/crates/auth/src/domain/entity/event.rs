//! Domain Events
//!
//! Published fire-and-forget after the state change they describe has been
//! committed. Consumers must tolerate duplicates.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::Serialize;
use uuid::Uuid;

/// `source` attribute of every envelope.
pub const EVENT_SOURCE: &str = "/auth-service";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    #[serde(rename_all = "camelCase")]
    UserRegistered {
        user_id: UserId,
        email: String,
        full_name: String,
    },
    #[serde(rename_all = "camelCase")]
    UserLoggedIn {
        user_id: UserId,
        ip: Option<String>,
        user_agent: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UserLoggedOut { user_id: UserId },
}

impl DomainEvent {
    pub const fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::UserRegistered { .. } => "user.registered",
            DomainEvent::UserLoggedIn { .. } => "user.logged_in",
            DomainEvent::UserLoggedOut { .. } => "user.logged_out",
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            DomainEvent::UserRegistered { user_id, .. }
            | DomainEvent::UserLoggedIn { user_id, .. }
            | DomainEvent::UserLoggedOut { user_id } => *user_id,
        }
    }

    /// Wrap in a CloudEvents 1.0 style envelope.
    pub fn envelope(&self) -> EventEnvelope<'_> {
        EventEnvelope {
            specversion: "1.0",
            event_type: self.event_type(),
            source: EVENT_SOURCE,
            id: Uuid::new_v4(),
            time: Utc::now(),
            datacontenttype: "application/json",
            data: self,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a> {
    pub specversion: &'static str,
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub source: &'static str,
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub datacontenttype: &'static str,
    pub data: &'a DomainEvent,
}
