/// Boards and their membership snapshots
///
/// A board has exactly one owner, who is always also a row in
/// `board_members`. [`Board::create`] writes both rows, so run it inside a
/// transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE boards (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(100) NOT NULL,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use kanban_shared::models::board::{Board, CreateBoard, RowLock};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
///
/// let board = Board::create(&mut tx, CreateBoard {
///     title: "Release 1.0".to_string(),
///     owner_id,
/// }).await?;
///
/// let access = Board::access(&mut tx, board.id, RowLock::Share).await?.unwrap();
/// assert!(access.is_member(owner_id));
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::auth::gate::BoardAccess;

/// Row lock taken on the board while loading its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    None,

    /// `FOR SHARE`: blocks membership changes, not other guarded writes
    Share,

    /// `FOR UPDATE`: exclusive, used for membership changes
    Update,
}

impl RowLock {
    fn clause(&self) -> &'static str {
        match self {
            RowLock::None => "",
            RowLock::Share => " FOR SHARE",
            RowLock::Update => " FOR UPDATE",
        }
    }
}

/// Board row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Board with aggregate counts, used by the board list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BoardSummary {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    pub member_count: i64,
    pub ticket_count: i64,
    pub tasks_to_do_count: i64,
    pub tasks_high_prio_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoard {
    pub title: String,
    pub owner_id: Uuid,
}

#[derive(sqlx::FromRow)]
struct AccessRow {
    id: Uuid,
    owner_id: Uuid,
    member_ids: Vec<Uuid>,
}

impl From<AccessRow> for BoardAccess {
    fn from(row: AccessRow) -> Self {
        BoardAccess::new(row.id, row.owner_id, row.member_ids)
    }
}

const ACCESS_SELECT: &str = r#"
    SELECT b.id, b.owner_id,
           COALESCE(
               ARRAY_AGG(m.user_id) FILTER (WHERE m.user_id IS NOT NULL),
               '{}'
           ) AS member_ids
    FROM boards b
    LEFT JOIN board_members m ON m.board_id = b.id
"#;

impl Board {
    /// Creates a board and makes the owner its sole member
    pub async fn create(conn: &mut PgConnection, data: CreateBoard) -> Result<Self, sqlx::Error> {
        let board = sqlx::query_as::<_, Board>(
            r#"
            INSERT INTO boards (title, owner_id)
            VALUES ($1, $2)
            RETURNING id, title, owner_id, created_at, updated_at
            "#,
        )
        .bind(data.title.trim())
        .bind(data.owner_id)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(r#"INSERT INTO board_members (board_id, user_id) VALUES ($1, $2)"#)
            .bind(board.id)
            .bind(board.owner_id)
            .execute(&mut *conn)
            .await?;

        Ok(board)
    }

    /// Finds a board by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let board = sqlx::query_as::<_, Board>(
            r#"
            SELECT id, title, owner_id, created_at, updated_at
            FROM boards
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(board)
    }

    /// Loads the membership snapshot of one board
    ///
    /// The board row is locked according to `lock` for the rest of the
    /// transaction; the member rows are read afterwards so they reflect any
    /// change that committed before the lock was granted.
    ///
    /// # Returns
    ///
    /// None if the board does not exist
    pub async fn access(
        conn: &mut PgConnection,
        id: Uuid,
        lock: RowLock,
    ) -> Result<Option<BoardAccess>, sqlx::Error> {
        let query = format!(
            "SELECT id, owner_id FROM boards WHERE id = $1{}",
            lock.clause()
        );

        let Some((board_id, owner_id)) = sqlx::query_as::<_, (Uuid, Uuid)>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let members: Vec<Uuid> =
            sqlx::query_scalar(r#"SELECT user_id FROM board_members WHERE board_id = $1"#)
                .bind(board_id)
                .fetch_all(&mut *conn)
                .await?;

        Ok(Some(BoardAccess::new(board_id, owner_id, members)))
    }

    /// Snapshots of every board `user_id` owns or belongs to
    ///
    /// With a lock, the boards are locked in id order before their members
    /// are read.
    pub async fn accesses_for_member(
        conn: &mut PgConnection,
        user_id: Uuid,
        lock: RowLock,
    ) -> Result<Vec<BoardAccess>, sqlx::Error> {
        let query = format!(
            "SELECT b.id FROM boards b \
             WHERE b.owner_id = $1 \
             OR EXISTS (SELECT 1 FROM board_members x WHERE x.board_id = b.id AND x.user_id = $1) \
             ORDER BY b.id{}",
            lock.clause()
        );

        let ids: Vec<Uuid> = sqlx::query_scalar(&query)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Self::aggregate_accesses(conn, &ids).await
    }

    /// Snapshots of the boards in `ids`, unknown ids skipped
    pub async fn accesses_by_ids(
        conn: &mut PgConnection,
        ids: &[Uuid],
        lock: RowLock,
    ) -> Result<Vec<BoardAccess>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        if lock != RowLock::None {
            let query = format!(
                "SELECT id FROM boards WHERE id = ANY($1) ORDER BY id{}",
                lock.clause()
            );

            sqlx::query(&query).bind(ids).execute(&mut *conn).await?;
        }

        Self::aggregate_accesses(conn, ids).await
    }

    // Postgres refuses row locks next to GROUP BY, so locking happens first
    async fn aggregate_accesses(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<Vec<BoardAccess>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "{} WHERE b.id = ANY($1) GROUP BY b.id, b.owner_id ORDER BY b.id",
            ACCESS_SELECT
        );

        let rows = sqlx::query_as::<_, AccessRow>(&query)
            .bind(ids)
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.into_iter().map(BoardAccess::from).collect())
    }

    /// Summaries with member and task counts for the boards in `ids`
    ///
    /// Ordered oldest first.
    pub async fn summaries(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<Vec<BoardSummary>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let summaries = sqlx::query_as::<_, BoardSummary>(
            r#"
            SELECT b.id, b.title, b.owner_id, b.created_at,
                   (SELECT COUNT(*) FROM board_members m WHERE m.board_id = b.id) AS member_count,
                   (SELECT COUNT(*) FROM tasks t WHERE t.board_id = b.id) AS ticket_count,
                   (SELECT COUNT(*) FROM tasks t
                     WHERE t.board_id = b.id AND t.status = 'to-do') AS tasks_to_do_count,
                   (SELECT COUNT(*) FROM tasks t
                     WHERE t.board_id = b.id AND t.priority = 'high') AS tasks_high_prio_count
            FROM boards b
            WHERE b.id = ANY($1)
            ORDER BY b.created_at, b.id
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(summaries)
    }

    /// Renames a board
    ///
    /// # Returns
    ///
    /// The updated board, None if it does not exist
    pub async fn update_title(
        conn: &mut PgConnection,
        id: Uuid,
        title: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let board = sqlx::query_as::<_, Board>(
            r#"
            UPDATE boards
            SET title = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, owner_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(title.trim())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(board)
    }

    /// Deletes a board; tasks and comments go with it
    ///
    /// # Returns
    ///
    /// True if a board was deleted
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM boards WHERE id = $1"#)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
