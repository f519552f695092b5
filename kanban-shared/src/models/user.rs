/// User accounts
///
/// Emails are stored and looked up exactly as given: `Alice@Example.com`
/// and `alice@example.com` are different addresses. Passwords are stored
/// as Argon2id hashes only.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,          -- users_email_key UNIQUE
///     fullname VARCHAR(150) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use kanban_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let mut conn = pool.acquire().await?;
///
/// let user = User::create(&mut conn, CreateUser {
///     email: "Alice@Example.com".to_string(),
///     fullname: "Alice Example".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
/// assert_eq!(user.email, "Alice@Example.com");
///
/// assert!(User::email_exists(&mut conn, "Alice@Example.com").await?);
/// assert!(!User::email_exists(&mut conn, "alice@example.com").await?);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// Name of the unique constraint on `users.email`
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Email address as registered, unique
    pub email: String,

    pub fullname: String,

    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// None until the first login
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Public view of a user embedded in boards and tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub fullname: String,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Stored verbatim
    pub email: String,

    pub fullname: String,

    /// Argon2id hash, not the plaintext password
    pub password_hash: String,
}

impl User {
    /// Creates a user
    ///
    /// # Errors
    ///
    /// Returns a database error carrying [`EMAIL_UNIQUE_CONSTRAINT`] if the
    /// email is already registered.
    pub async fn create(conn: &mut PgConnection, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, fullname, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, fullname, password_hash, created_at, updated_at, last_login_at
            "#,
        )
        .bind(data.email)
        .bind(data.fullname.trim())
        .bind(data.password_hash)
        .fetch_one(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Finds a user by exact email
    pub async fn find_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, fullname, password_hash, created_at, updated_at, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Checks whether an email is registered
    ///
    /// Exact match: no trimming, case-sensitive.
    pub async fn email_exists(conn: &mut PgConnection, email: &str) -> Result<bool, sqlx::Error> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)"#)
                .bind(email)
                .fetch_one(&mut *conn)
                .await?;

        Ok(exists)
    }

    /// Records a successful login
    pub async fn update_last_login(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE users SET last_login_at = NOW() WHERE id = $1"#)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Returns which of `ids` belong to existing users
    pub async fn existing_ids(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<Uuid> = sqlx::query_scalar(r#"SELECT id FROM users WHERE id = ANY($1)"#)
            .bind(ids)
            .fetch_all(&mut *conn)
            .await?;

        Ok(found)
    }

    /// Loads summaries for `ids`, ordered by full name
    ///
    /// Unknown ids are skipped.
    pub async fn summaries(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, email, fullname
            FROM users
            WHERE id = ANY($1)
            ORDER BY fullname, email
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(users)
    }
}
