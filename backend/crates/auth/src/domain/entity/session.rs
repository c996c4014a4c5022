//! Session cache entry
//!
//! Convenience data cached per user on login. Authorization never depends
//! on it; a missing entry is not an error anywhere.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub user_id: UserId,
    pub email: String,
    pub roles: Vec<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub login_at: DateTime<Utc>,
}
