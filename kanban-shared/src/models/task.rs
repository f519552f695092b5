/// Tasks on a board
///
/// A task belongs to exactly one board for its whole life. Assignee and
/// reviewer are optional references to users; the API only accepts board
/// members for them, but a later membership removal leaves them in place.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('to-do', 'in-progress', 'review', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     board_id UUID NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
///     title VARCHAR(100) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status task_status NOT NULL DEFAULT 'to-do',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     reviewer_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     due_date DATE,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Every query returns `comments_count` alongside the row.
///
/// # Example
///
/// ```no_run
/// use kanban_shared::models::task::{CreateTask, Task, TaskPriority, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, board_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut conn = pool.acquire().await?;
///
/// let task = Task::create(&mut conn, CreateTask {
///     board_id,
///     title: "Write release notes".to_string(),
///     description: String::new(),
///     status: TaskStatus::ToDo,
///     priority: TaskPriority::High,
///     assignee_id: Some(user_id),
///     reviewer_id: None,
///     due_date: None,
///     created_by: Some(user_id),
/// }).await?;
///
/// let mine = Task::list_by_assignee(&mut conn, user_id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::auth::gate::{Assignable, BoardScoped};

/// Workflow column of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    ToDo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "to-do",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

/// Task row plus its comment count
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Owning board, never changes
    pub board_id: Uuid,

    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,

    /// Null once the creator's account is gone
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments_count: i64,
}

impl BoardScoped for Task {
    fn board_id(&self) -> Uuid {
        self.board_id
    }
}

impl Assignable for Task {
    fn assignee_id(&self) -> Option<Uuid> {
        self.assignee_id
    }

    fn reviewer_id(&self) -> Option<Uuid> {
        self.reviewer_id
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub board_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
}

/// Partial task update
///
/// `None` leaves a field alone. For nullable columns `Some(None)` clears
/// the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Option<Uuid>>,
    pub reviewer_id: Option<Option<Uuid>>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee_id.is_none()
            && self.reviewer_id.is_none()
            && self.due_date.is_none()
    }
}

const TASK_COLUMNS: &str = r#"
    t.id, t.board_id, t.title, t.description, t.status, t.priority,
    t.assignee_id, t.reviewer_id, t.due_date, t.created_by,
    t.created_at, t.updated_at,
    (SELECT COUNT(*) FROM comments c WHERE c.task_id = t.id) AS comments_count
"#;

impl Task {
    /// Creates a task
    ///
    /// Membership of assignee and reviewer is not checked here.
    pub async fn create(conn: &mut PgConnection, data: CreateTask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            WITH t AS (
                INSERT INTO tasks (board_id, title, description, status, priority,
                                   assignee_id, reviewer_id, due_date, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
            )
            SELECT {} FROM t
            "#,
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(data.board_id)
            .bind(data.title.trim())
            .bind(data.description)
            .bind(data.status)
            .bind(data.priority)
            .bind(data.assignee_id)
            .bind(data.reviewer_id)
            .bind(data.due_date)
            .bind(data.created_by)
            .fetch_one(&mut *conn)
            .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM tasks t WHERE t.id = $1", TASK_COLUMNS);

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(task)
    }

    /// Lists the tasks of a board, oldest first
    pub async fn list_by_board(
        conn: &mut PgConnection,
        board_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks t WHERE t.board_id = $1 ORDER BY t.created_at, t.id",
            TASK_COLUMNS
        );

        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(board_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(tasks)
    }

    /// Lists tasks assigned to `user_id` across all boards
    ///
    /// Not filtered by membership; see [`crate::auth::gate::filter_task_view`].
    pub async fn list_by_assignee(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks t WHERE t.assignee_id = $1 ORDER BY t.created_at, t.id",
            TASK_COLUMNS
        );

        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(tasks)
    }

    /// Lists tasks `user_id` reviews across all boards
    ///
    /// Not filtered by membership; see [`crate::auth::gate::filter_task_view`].
    pub async fn list_by_reviewer(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks t WHERE t.reviewer_id = $1 ORDER BY t.created_at, t.id",
            TASK_COLUMNS
        );

        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(tasks)
    }

    /// Applies a partial update
    ///
    /// # Returns
    ///
    /// The updated task, None if it does not exist
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            WITH t AS (
                UPDATE tasks SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    status = COALESCE($4, status),
                    priority = COALESCE($5, priority),
                    assignee_id = CASE WHEN $6 THEN $7 ELSE assignee_id END,
                    reviewer_id = CASE WHEN $8 THEN $9 ELSE reviewer_id END,
                    due_date = CASE WHEN $10 THEN $11 ELSE due_date END,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM t
            "#,
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(data.title.map(|title| title.trim().to_string()))
            .bind(data.description)
            .bind(data.status)
            .bind(data.priority)
            .bind(data.assignee_id.is_some())
            .bind(data.assignee_id.flatten())
            .bind(data.reviewer_id.is_some())
            .bind(data.reviewer_id.flatten())
            .bind(data.due_date.is_some())
            .bind(data.due_date.flatten())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(task)
    }

    /// Deletes a task and its comments
    ///
    /// # Returns
    ///
    /// True if a task was deleted
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM tasks WHERE id = $1"#)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
