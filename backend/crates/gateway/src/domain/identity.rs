//! Caller identity forwarded to downstream services

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl CallerIdentity {
    /// Write the identity headers, replacing anything the caller sent.
    pub fn apply(&self, headers: &mut HeaderMap) {
        strip_identity(headers);
        insert(headers, X_USER_ID, &self.user_id);
        if let Some(email) = &self.email {
            insert(headers, X_USER_EMAIL, email);
        }
        if let Some(role) = &self.role {
            insert(headers, X_USER_ROLE, role);
        }
    }
}

/// Remove every `x-user-*` header. Downstream services trust these.
pub fn strip_identity(headers: &mut HeaderMap) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("x-user-"))
        .cloned()
        .collect();
    for name in spoofed {
        headers.remove(name);
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Identity value not representable as a header"),
    }
}
