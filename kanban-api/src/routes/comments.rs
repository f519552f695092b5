/// Comment endpoints
///
/// # Endpoints
///
/// - `GET /api/tasks/:task_id/comments` - Comments of a task, newest first
/// - `POST /api/tasks/:task_id/comments` - Comment as the caller
/// - `GET /api/tasks/:task_id/comments/:comment_id` - One comment
/// - `PUT|PATCH /api/tasks/:task_id/comments/:comment_id` - Edit (author only)
/// - `DELETE /api/tasks/:task_id/comments/:comment_id` - Delete (author only)
///
/// Reading and writing comments requires membership of the task's board.
/// Editing and deleting is decided by authorship alone.

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
use kanban_shared::{
    auth::{
        authorization::{require_comment_access, require_comments_access},
        gate::Operation,
        middleware::AuthContext,
    },
    models::comment::Comment,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(
        length(min = 1, max = 5000, message = "Content must be 1 to 5000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    let mut tx = state.db.begin().await?;

    let (task, _) =
        require_comments_access(&mut tx, auth.user_id, task_id, Operation::Read).await?;
    let comments = Comment::list_by_task(&mut tx, task.id).await?;

    tx.commit().await?;

    Ok(Json(comments))
}

/// Adds a comment authored by the caller
///
/// ```text
/// POST /api/tasks/:task_id/comments
///
/// { "content": "Looks good to me" }
/// ```
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let Json(req) = payload?;
    validate_request(&req)?;

    let mut tx = state.db.begin().await?;

    let (task, _) =
        require_comments_access(&mut tx, auth.user_id, task_id, Operation::Create).await?;
    let comment = Comment::create(&mut tx, task.id, auth.user_id, &req.content).await?;

    tx.commit().await?;

    info!(comment_id = %comment.id, task_id = %task_id, user_id = %auth.user_id, "Comment created");

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((task_id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Comment>> {
    let mut tx = state.db.begin().await?;

    let (comment, _) =
        require_comment_access(&mut tx, auth.user_id, task_id, comment_id, Operation::Read)
            .await?;

    tx.commit().await?;

    Ok(Json(comment))
}

/// Replaces the content of a comment
///
/// # Errors
///
/// - `403 Forbidden`: caller is not the author
/// - `404 Not Found`: task or comment missing, or caller outside the board
///   and not the author
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((task_id, comment_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<Json<Comment>> {
    let Json(req) = payload?;
    validate_request(&req)?;

    let mut tx = state.db.begin().await?;

    let (comment, _) =
        require_comment_access(&mut tx, auth.user_id, task_id, comment_id, Operation::Update)
            .await?;

    let comment = Comment::update_content(&mut tx, comment.id, &req.content)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    tx.commit().await?;

    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((task_id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let (comment, _) =
        require_comment_access(&mut tx, auth.user_id, task_id, comment_id, Operation::Delete)
            .await?;
    Comment::delete(&mut tx, comment.id).await?;

    tx.commit().await?;

    info!(comment_id = %comment_id, task_id = %task_id, user_id = %auth.user_id, "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}
