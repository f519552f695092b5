/// Task endpoints
///
/// # Endpoints
///
/// - `POST /api/tasks` - Create a task on a board
/// - `GET /api/tasks/assigned-to-me` - Tasks the caller is assigned to
/// - `GET /api/tasks/reviewing` - Tasks the caller reviews
/// - `GET /api/tasks/:task_id` - Task detail
/// - `PUT|PATCH /api/tasks/:task_id` - Partial update
/// - `DELETE /api/tasks/:task_id` - Delete a task and its comments
///
/// Every operation requires membership of the task's board. Assignee and
/// reviewer must already be members; they are never added implicitly.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{not_blank, validate_request},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use kanban_shared::{
    auth::{
        authorization::{load_board_access, require_assignable, require_task_access},
        gate::{self, BoardAccess, Operation, Resource, TaskView},
        middleware::AuthContext,
    },
    models::{
        board::{Board, RowLock},
        task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask},
        user::{User, UserSummary},
    },
};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgConnection;
use std::collections::{BTreeSet, HashMap};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Task with its assignee and reviewer resolved
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,

    /// None when unassigned or when the user no longer exists
    pub assignee: Option<UserSummary>,

    pub reviewer: Option<UserSummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Board the task goes on, immutable afterwards
    pub board_id: Uuid,

    #[validate(
        length(min = 1, max = 100, message = "Title must be 1 to 100 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    pub assignee_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

/// Partial task update
///
/// Absent fields are left alone; `null` clears `assignee_id`,
/// `reviewer_id` and `due_date`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    /// Accepted only when it names the current board
    pub board_id: Option<Uuid>,

    #[validate(
        length(min = 1, max = 100, message = "Title must be 1 to 100 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "nullable")]
    pub assignee_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "nullable")]
    pub reviewer_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
}

/// Tells an explicit `null` (Some(None)) apart from a missing field (None)
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            assignee_id: req.assignee_id,
            reviewer_id: req.reviewer_id,
            due_date: req.due_date,
        }
    }
}

/// Resolves assignee and reviewer summaries for `tasks`
pub(crate) async fn with_people(
    conn: &mut PgConnection,
    tasks: Vec<Task>,
) -> Result<Vec<TaskResponse>, sqlx::Error> {
    let ids: Vec<Uuid> = tasks
        .iter()
        .flat_map(|task| [task.assignee_id, task.reviewer_id])
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let people: HashMap<Uuid, UserSummary> = User::summaries(conn, &ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let lookup = |id: Option<Uuid>| id.and_then(|id| people.get(&id).cloned());

    Ok(tasks
        .into_iter()
        .map(|task| TaskResponse {
            assignee: lookup(task.assignee_id),
            reviewer: lookup(task.reviewer_id),
            task,
        })
        .collect())
}

/// The user an update puts into an assignment slot, if it changes the slot
///
/// Clearing a slot, or re-sending its current user (who may have left the
/// board since), needs no membership check.
fn reassigned(requested: Option<Option<Uuid>>, current: Option<Uuid>) -> Option<Uuid> {
    requested.flatten().filter(|id| Some(*id) != current)
}

async fn respond(conn: &mut PgConnection, task: Task) -> ApiResult<TaskResponse> {
    with_people(conn, vec![task])
        .await?
        .pop()
        .ok_or_else(|| ApiError::InternalError("Task vanished while loading people".to_string()))
}

/// Creates a task
///
/// ```text
/// POST /api/tasks
///
/// {
///   "board_id": "uuid",
///   "title": "Write release notes",
///   "status": "to-do",
///   "priority": "high",
///   "assignee_id": "uuid",
///   "due_date": "2025-03-01"
/// }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: board missing or caller not a member
/// - `422 Unprocessable Entity`: invalid fields, or an assignee/reviewer
///   outside the board
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let Json(req) = payload?;
    validate_request(&req)?;

    let mut tx = state.db.begin().await?;

    let access = load_board_access(&mut tx, req.board_id, RowLock::Share).await?;
    gate::authorize(Some(auth.user_id), Resource::Task(&access), Operation::Create)?;
    require_assignable(&access, req.assignee_id, req.reviewer_id)?;

    let task = Task::create(
        &mut tx,
        CreateTask {
            board_id: req.board_id,
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            assignee_id: req.assignee_id,
            reviewer_id: req.reviewer_id,
            due_date: req.due_date,
            created_by: Some(auth.user_id),
        },
    )
    .await?;

    let response = respond(&mut tx, task).await?;
    tx.commit().await?;

    info!(
        task_id = %response.task.id,
        board_id = %response.task.board_id,
        user_id = %auth.user_id,
        "Task created"
    );

    Ok((StatusCode::CREATED, Json(response)))
}

/// Tasks assigned to the caller on boards they still belong to
pub async fn assigned_to_me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    task_view(&state, auth.user_id, TaskView::AssignedToMe).await
}

/// Tasks the caller reviews on boards they still belong to
pub async fn reviewing(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    task_view(&state, auth.user_id, TaskView::Reviewing).await
}

async fn task_view(
    state: &AppState,
    actor: Uuid,
    view: TaskView,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let mut tx = state.db.begin().await?;

    let tasks = match view {
        TaskView::AssignedToMe => Task::list_by_assignee(&mut tx, actor).await?,
        TaskView::Reviewing => Task::list_by_reviewer(&mut tx, actor).await?,
    };

    let board_ids: Vec<Uuid> = tasks
        .iter()
        .map(|task| task.board_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Membership is read after the lock, so a removal that committed after
    // the task list was read still hides those tasks
    let boards: HashMap<Uuid, BoardAccess> =
        Board::accesses_by_ids(&mut tx, &board_ids, RowLock::Share)
            .await?
            .into_iter()
            .map(|board| (board.board_id, board))
            .collect();

    let tasks = gate::filter_task_view(actor, view, tasks, &boards);
    let tasks = with_people(&mut tx, tasks).await?;

    tx.commit().await?;

    Ok(Json(tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let mut tx = state.db.begin().await?;

    let (task, _) = require_task_access(&mut tx, auth.user_id, task_id, Operation::Read).await?;
    let response = respond(&mut tx, task).await?;

    tx.commit().await?;

    Ok(Json(response))
}

/// Applies a partial update to a task
///
/// Nothing is written if any check fails.
///
/// # Errors
///
/// - `400 Bad Request`: attempt to move the task to another board
/// - `404 Not Found`: task missing or caller not a member
/// - `422 Unprocessable Entity`: invalid fields, or an assignee/reviewer
///   outside the board
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<TaskResponse>> {
    let Json(req) = payload?;
    validate_request(&req)?;

    let mut tx = state.db.begin().await?;

    let (task, access) =
        require_task_access(&mut tx, auth.user_id, task_id, Operation::Update).await?;

    if req.board_id.is_some_and(|board_id| board_id != task.board_id) {
        return Err(ApiError::BadRequest(
            "A task cannot be moved to another board".to_string(),
        ));
    }

    require_assignable(
        &access,
        reassigned(req.assignee_id, task.assignee_id),
        reassigned(req.reviewer_id, task.reviewer_id),
    )?;

    let task = Task::update(&mut tx, task.id, UpdateTask::from(req))
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    let response = respond(&mut tx, task).await?;
    tx.commit().await?;

    info!(task_id = %task_id, user_id = %auth.user_id, "Task updated");

    Ok(Json(response))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let (task, _) = require_task_access(&mut tx, auth.user_id, task_id, Operation::Delete).await?;
    Task::delete(&mut tx, task.id).await?;

    tx.commit().await?;

    info!(task_id = %task_id, user_id = %auth.user_id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
