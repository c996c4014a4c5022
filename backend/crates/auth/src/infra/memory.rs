//! In-memory store
//!
//! Implements every auth port against process memory. Used by tests and by
//! single-instance deployments that can afford to lose state on restart.
//! Expired revocations and sessions read as absent and are swept by later
//! writes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use kernel::id::UserId;
use platform::crypto::sha256_hex;
use tokio::sync::RwLock;

use crate::domain::entity::{
    audit::AuditEntry, event::DomainEvent, session::SessionEntry, user::User,
};
use crate::domain::repository::{
    AuditRepository, EventPublisher, RevocationRegistry, SessionCache, UserRepository,
};
use crate::domain::value_object::{email::Email, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Entries with a deadline. A write sweeps every lapsed entry once the
/// earliest deadline has passed, so the map never outgrows its live set by
/// more than what expired since the last write.
struct ExpiringMap<K, V> {
    entries: HashMap<K, (V, Instant)>,
    next_expiry: Option<Instant>,
}

impl<K, V> Default for ExpiringMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_expiry: None,
        }
    }
}

impl<K: Eq + Hash, V> ExpiringMap<K, V> {
    fn get(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(_, expires)| *expires > now)
            .map(|(value, _)| value)
    }

    fn insert(&mut self, key: K, value: V, expires: Instant, now: Instant) {
        self.sweep(now);
        self.entries.insert(key, (value, expires));
        self.track(expires);
    }

    /// Like `insert`, but an existing live entry only ever gains time.
    fn extend(&mut self, key: K, value: V, expires: Instant, now: Instant) {
        self.sweep(now);
        match self.entries.get_mut(&key) {
            Some((_, current)) if *current >= expires => {}
            Some(entry) => *entry = (value, expires),
            None => {
                self.entries.insert(key, (value, expires));
                self.track(expires);
            }
        }
    }

    fn remove(&mut self, key: &K) {
        self.entries.remove(key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn track(&mut self, expires: Instant) {
        self.next_expiry = Some(self.next_expiry.map_or(expires, |next| next.min(expires)));
    }

    fn sweep(&mut self, now: Instant) {
        if self.next_expiry.is_some_and(|next| next <= now) {
            self.entries.retain(|_, (_, expires)| *expires > now);
            self.next_expiry = self.entries.values().map(|(_, expires)| *expires).min();
        }
    }
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    roles: HashMap<UserId, Vec<UserRole>>,
    revoked: ExpiringMap<String, ()>,
    sessions: ExpiringMap<UserId, SessionEntry>,
    audit: Vec<AuditEntry>,
    events: Vec<DomainEvent>,
}

#[derive(Default)]
struct Faults {
    side_effects: AtomicBool,
    revocations: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    state: Arc<RwLock<State>>,
    faults: Arc<Faults>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make audit appends and event publishes fail.
    pub fn fail_side_effects(&self, fail: bool) {
        self.faults.side_effects.store(fail, Ordering::Relaxed);
    }

    /// Make revocation writes and lookups fail.
    pub fn fail_revocations(&self, fail: bool) {
        self.faults.revocations.store(fail, Ordering::Relaxed);
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.clone()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.state.read().await.events.clone()
    }

    /// Grant an extra role out of band.
    pub async fn grant_role(&self, user_id: &UserId, role: UserRole) {
        let mut state = self.state.write().await;
        let roles = state.roles.entry(*user_id).or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    pub async fn set_active(&self, user_id: &UserId, active: bool) {
        if let Some(user) = self.state.write().await.users.get_mut(user_id) {
            user.is_active = active;
        }
    }

    fn check_revocation_fault(&self) -> AuthResult<()> {
        if self.faults.revocations.load(Ordering::Relaxed) {
            return Err(AuthError::Internal("revocation store unavailable".to_string()));
        }
        Ok(())
    }

    fn check_side_effect_fault(&self) -> AuthResult<()> {
        if self.faults.side_effects.load(Ordering::Relaxed) {
            return Err(AuthError::Internal("side-effect sink unavailable".to_string()));
        }
        Ok(())
    }
}

impl UserRepository for MemoryAuthStore {
    async fn create_with_role(&self, user: &User, role: UserRole) -> AuthResult<()> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        state.users.insert(user.id, user.clone());
        state.roles.insert(user.id, vec![role]);
        Ok(())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| &u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn roles_for(&self, user_id: &UserId) -> AuthResult<Vec<UserRole>> {
        let state = self.state.read().await;
        let mut roles = state.roles.get(user_id).cloned().unwrap_or_default();
        roles.sort();
        Ok(roles)
    }

    async fn update_login_state(&self, user: &User) -> AuthResult<()> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.users.get_mut(&user.id) {
            stored.failed_login_attempts = user.failed_login_attempts;
            stored.locked_until = user.locked_until;
            stored.last_login = user.last_login;
            stored.updated_at = user.updated_at;
        }
        Ok(())
    }
}

impl RevocationRegistry for MemoryAuthStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> AuthResult<()> {
        self.check_revocation_fault()?;
        let now = Instant::now();
        self.state
            .write()
            .await
            .revoked
            .extend(sha256_hex(token.as_bytes()), (), now + ttl, now);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> AuthResult<bool> {
        self.check_revocation_fault()?;
        let key = sha256_hex(token.as_bytes());
        let state = self.state.read().await;
        Ok(state.revoked.get(&key, Instant::now()).is_some())
    }
}

impl SessionCache for MemoryAuthStore {
    async fn put_session(&self, entry: &SessionEntry, ttl: Duration) -> AuthResult<()> {
        let now = Instant::now();
        self.state
            .write()
            .await
            .sessions
            .insert(entry.user_id, entry.clone(), now + ttl, now);
        Ok(())
    }

    async fn get_session(&self, user_id: &UserId) -> AuthResult<Option<SessionEntry>> {
        let state = self.state.read().await;
        Ok(state.sessions.get(user_id, Instant::now()).cloned())
    }

    async fn delete_session(&self, user_id: &UserId) -> AuthResult<()> {
        self.state.write().await.sessions.remove(user_id);
        Ok(())
    }
}

impl AuditRepository for MemoryAuthStore {
    async fn append(&self, entry: &AuditEntry) -> AuthResult<()> {
        self.check_side_effect_fault()?;
        self.state.write().await.audit.push(entry.clone());
        Ok(())
    }
}

impl EventPublisher for MemoryAuthStore {
    async fn publish(&self, event: &DomainEvent) -> AuthResult<()> {
        self.check_side_effect_fault()?;
        self.state.write().await.events.push(event.clone());
        Ok(())
    }
}
