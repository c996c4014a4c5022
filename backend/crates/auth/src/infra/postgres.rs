//! PostgreSQL Repository Implementations
//!
//! One pool backs the credential store, the revocation registry, the
//! session cache and the audit log. Raw tokens never reach the database:
//! revocation rows are keyed by the SHA-256 of the token.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::crypto::sha256_hex;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{audit::AuditEntry, session::SessionEntry, user::User};
use crate::domain::repository::{
    AuditRepository, RevocationRegistry, SessionCache, UserRepository,
};
use crate::domain::value_object::{email::Email, full_name::FullName, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Drop revocation and session rows that have outlived their TTL.
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = Utc::now();

        let revoked = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let sessions = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(
            revoked_tokens_deleted = revoked,
            sessions_deleted = sessions,
            "Cleaned up expired auth rows"
        );

        Ok(revoked + sessions)
    }

    /// Readiness probe
    pub async fn ping(&self) -> AuthResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn expiry_from_now(ttl: Duration) -> AuthResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AuthError::Internal("TTL out of range".to_string()))
}

// ============================================================================
// User Repository Implementation
// ============================================================================

const USER_COLUMNS: &str = r#"
    id,
    email,
    password_hash,
    full_name,
    phone_number,
    country_code,
    is_active,
    failed_login_attempts,
    locked_until,
    last_login,
    created_at,
    updated_at
"#;

impl UserRepository for PgAuthRepository {
    async fn create_with_role(&self, user: &User, role: UserRole) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                email,
                password_hash,
                full_name,
                phone_number,
                country_code,
                is_active,
                failed_login_attempts,
                locked_until,
                last_login,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.full_name.as_str())
        .bind(&user.phone_number)
        .bind(&user.country_code)
        .bind(user.is_active)
        .bind(user.failed_login_attempts as i32)
        .bind(user.locked_until)
        .bind(user.last_login)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_email)?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user.id.as_uuid())
            .bind(role.code())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn roles_for(&self, user_id: &UserId) -> AuthResult<Vec<UserRole>> {
        let codes = sqlx::query_scalar::<_, String>(
            "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(codes
            .iter()
            .filter_map(|code| UserRole::from_code(code))
            .collect())
    }

    async fn update_login_state(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                failed_login_attempts = $2,
                locked_until = $3,
                last_login = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.failed_login_attempts as i32)
        .bind(user.locked_until)
        .bind(user.last_login)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn map_unique_email(err: sqlx::Error) -> AuthError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::EmailTaken,
        _ => AuthError::Database(err),
    }
}

// ============================================================================
// Revocation Registry Implementation
// ============================================================================

impl RevocationRegistry for PgAuthRepository {
    async fn revoke(&self, token: &str, ttl: Duration) -> AuthResult<()> {
        let expires_at = expiry_from_now(ttl)?;

        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_hash, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (token_hash) DO UPDATE SET
                expires_at = GREATEST(revoked_tokens.expires_at, EXCLUDED.expires_at)
            "#,
        )
        .bind(sha256_hex(token.as_bytes()))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> AuthResult<bool> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_hash = $1 AND expires_at > $2)",
        )
        .bind(sha256_hex(token.as_bytes()))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(revoked)
    }
}

// ============================================================================
// Session Cache Implementation
// ============================================================================

impl SessionCache for PgAuthRepository {
    async fn put_session(&self, entry: &SessionEntry, ttl: Duration) -> AuthResult<()> {
        let expires_at = expiry_from_now(ttl)?;
        let payload = serde_json::to_string(entry)
            .map_err(|e| AuthError::Internal(format!("Failed to encode session: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO user_sessions (user_id, payload, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                payload = EXCLUDED.payload,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(entry.user_id.as_uuid())
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, user_id: &UserId) -> AuthResult<Option<SessionEntry>> {
        let payload = sqlx::query_scalar::<_, String>(
            "SELECT payload FROM user_sessions WHERE user_id = $1 AND expires_at > $2",
        )
        .bind(user_id.as_uuid())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        payload
            .map(|p| {
                serde_json::from_str(&p)
                    .map_err(|e| AuthError::Internal(format!("Corrupt session payload: {e}")))
            })
            .transpose()
    }

    async fn delete_session(&self, user_id: &UserId) -> AuthResult<()> {
        sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ============================================================================
// Audit Repository Implementation
// ============================================================================

impl AuditRepository for PgAuthRepository {
    async fn append(&self, entry: &AuditEntry) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id,
                user_id,
                event_type,
                event_data,
                ip,
                user_agent,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.user_id.map(|id| id.into_uuid()))
        .bind(entry.event_type.as_str())
        .bind(entry.event_data.to_string())
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    full_name: String,
    phone_number: Option<String>,
    country_code: Option<String>,
    is_active: bool,
    failed_login_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: UserId::from_uuid(self.id),
            email: Email::from_db(self.email),
            password_hash: self.password_hash,
            full_name: FullName::from_db(self.full_name),
            phone_number: self.phone_number,
            country_code: self.country_code,
            is_active: self.is_active,
            failed_login_attempts: self.failed_login_attempts.max(0) as u32,
            locked_until: self.locked_until,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
