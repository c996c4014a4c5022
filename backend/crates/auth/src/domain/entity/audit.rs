//! Audit Entry
//!
//! Append-only record of security-relevant actions. Written best-effort.

use chrono::{DateTime, Utc};
use kernel::id::{AuditEventId, UserId};
use platform::client::ClientInfo;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditEventType {
    #[serde(rename = "user.registered")]
    UserRegistered,
    #[serde(rename = "user.logged_in")]
    UserLoggedIn,
    #[serde(rename = "login.failed")]
    LoginFailed,
    #[serde(rename = "user.logged_out")]
    UserLoggedOut,
}

impl AuditEventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::UserRegistered => "user.registered",
            AuditEventType::UserLoggedIn => "user.logged_in",
            AuditEventType::LoginFailed => "login.failed",
            AuditEventType::UserLoggedOut => "user.logged_out",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: AuditEventId,
    pub user_id: Option<UserId>,
    pub event_type: AuditEventType,
    pub event_data: serde_json::Value,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        user_id: Option<UserId>,
        event_type: AuditEventType,
        event_data: serde_json::Value,
        client: &ClientInfo,
    ) -> Self {
        Self {
            id: AuditEventId::new(),
            user_id,
            event_type,
            event_data,
            ip: client.ip.map(|ip| ip.to_string()),
            user_agent: client.user_agent.clone(),
            created_at: Utc::now(),
        }
    }
}
