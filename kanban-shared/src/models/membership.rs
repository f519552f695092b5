/// Board membership rows
///
/// `board_members` is the only source of truth for who may see a board.
/// Membership is never inferred from task assignment: assigning someone to a
/// task requires them to be a member already.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE board_members (
///     board_id UUID NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (board_id, user_id)
/// );
/// ```
///
/// These functions do not check permissions; callers go through
/// [`crate::auth::gate`] first, holding the board row lock.
///
/// # Example
///
/// ```no_run
/// use kanban_shared::models::membership::BoardMember;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, board_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut conn = pool.acquire().await?;
///
/// BoardMember::add(&mut conn, board_id, user_id).await?;
/// let members = BoardMember::list_users(&mut conn, board_id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use super::user::UserSummary;
use crate::auth::gate::MembershipChange;

/// One user's membership of one board
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BoardMember {
    pub board_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl BoardMember {
    /// Adds a member
    ///
    /// # Returns
    ///
    /// True if the user was added, false if they were already a member
    pub async fn add(
        conn: &mut PgConnection,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO board_members (board_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (board_id, user_id) DO NOTHING
            "#,
        )
        .bind(board_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes a member
    ///
    /// Tasks keep pointing at the removed user as assignee/reviewer.
    ///
    /// # Returns
    ///
    /// True if a membership was removed
    pub async fn remove(
        conn: &mut PgConnection,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM board_members WHERE board_id = $1 AND user_id = $2"#)
            .bind(board_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a planned replacement of the member set
    pub async fn apply(
        conn: &mut PgConnection,
        board_id: Uuid,
        change: &MembershipChange,
    ) -> Result<(), sqlx::Error> {
        if !change.removed.is_empty() {
            sqlx::query(r#"DELETE FROM board_members WHERE board_id = $1 AND user_id = ANY($2)"#)
                .bind(board_id)
                .bind(&change.removed)
                .execute(&mut *conn)
                .await?;
        }

        if !change.added.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO board_members (board_id, user_id)
                SELECT $1, UNNEST($2::uuid[])
                ON CONFLICT (board_id, user_id) DO NOTHING
                "#,
            )
            .bind(board_id)
            .bind(&change.added)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Lists the members of a board as user summaries, ordered by name
    pub async fn list_users(
        conn: &mut PgConnection,
        board_id: Uuid,
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.email, u.fullname
            FROM board_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.board_id = $1
            ORDER BY u.fullname, u.email
            "#,
        )
        .bind(board_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(users)
    }
}
