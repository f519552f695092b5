/// Comments on tasks
///
/// Rows come back with the author's full name joined in. Lists are newest
/// first.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE comments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     content TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// Comment with its author's display name
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,

    /// Author's full name
    pub author: String,

    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COMMENT_COLUMNS: &str = r#"
    c.id, c.task_id, c.author_id, u.fullname AS author,
    c.content, c.created_at, c.updated_at
"#;

impl Comment {
    /// Creates a comment
    pub async fn create(
        conn: &mut PgConnection,
        task_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            WITH c AS (
                INSERT INTO comments (task_id, author_id, content)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT {} FROM c JOIN users u ON u.id = c.author_id
            "#,
            COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(task_id)
            .bind(author_id)
            .bind(content.trim())
            .fetch_one(&mut *conn)
            .await?;

        Ok(comment)
    }

    /// Finds a comment of a specific task
    ///
    /// A comment id belonging to another task yields None.
    pub async fn find(
        conn: &mut PgConnection,
        task_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.id = $1 AND c.task_id = $2",
            COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(task_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(comment)
    }

    /// Lists the comments of a task, newest first
    pub async fn list_by_task(
        conn: &mut PgConnection,
        task_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.task_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC",
            COMMENT_COLUMNS
        );

        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(task_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(comments)
    }

    /// Replaces the content of a comment
    pub async fn update_content(
        conn: &mut PgConnection,
        id: Uuid,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            WITH c AS (
                UPDATE comments
                SET content = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM c JOIN users u ON u.id = c.author_id
            "#,
            COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(content.trim())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(comment)
    }

    /// Deletes a comment
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM comments WHERE id = $1"#)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
