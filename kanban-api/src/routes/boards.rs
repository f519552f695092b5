/// Board and membership endpoints
///
/// # Endpoints
///
/// - `GET /api/boards` - Boards the caller is a member of, with counts
/// - `POST /api/boards` - Create a board; the caller becomes owner and sole member
/// - `GET /api/boards/:board_id` - Board detail with members and tasks
/// - `PUT|PATCH /api/boards/:board_id` - Rename, or replace the member set (owner)
/// - `DELETE /api/boards/:board_id` - Delete a board with its tasks and comments
/// - `POST /api/boards/:board_id/members` - Add one member (owner)
/// - `DELETE /api/boards/:board_id/members/:user_id` - Remove one member (owner)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        not_blank,
        tasks::{with_people, TaskResponse},
        validate_request,
    },
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use kanban_shared::{
    auth::{
        authorization::{load_board_access, require_board_access, require_membership_access},
        gate::{self, BoardAccess, Operation, Resource},
        middleware::AuthContext,
    },
    models::{
        board::{Board, BoardSummary, CreateBoard, RowLock},
        membership::BoardMember,
        task::Task,
        user::{User, UserSummary},
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Board with its members and tasks
#[derive(Debug, Serialize)]
pub struct BoardDetail {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    pub members: Vec<UserSummary>,
    pub tasks: Vec<TaskResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBoardRequest {
    #[validate(
        length(min = 1, max = 100, message = "Title must be 1 to 100 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
}

/// Board update
///
/// `title` needs membership. `members` is the complete new member set,
/// owner included, and needs ownership.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateBoardRequest {
    #[validate(
        length(min = 1, max = 100, message = "Title must be 1 to 100 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,

    pub members: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

/// Loads the detail view of the board `access` was taken from
///
/// Tasks go through [`gate::visible_tasks`] with that snapshot.
async fn load_detail(
    conn: &mut PgConnection,
    actor: Uuid,
    access: &BoardAccess,
) -> ApiResult<BoardDetail> {
    let board_id = access.board_id;
    let board = Board::find_by_id(conn, board_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Board not found".to_string()))?;

    let members = BoardMember::list_users(conn, board_id).await?;
    let tasks = Task::list_by_board(conn, board_id).await?;
    let tasks = gate::visible_tasks(actor, access, tasks);
    let tasks = with_people(conn, tasks).await?;

    Ok(BoardDetail {
        id: board.id,
        title: board.title,
        owner_id: board.owner_id,
        members,
        tasks,
        created_at: board.created_at,
        updated_at: board.updated_at,
    })
}

/// Every user in `ids` must exist
async fn require_users_exist(conn: &mut PgConnection, field: &str, ids: &[Uuid]) -> ApiResult<()> {
    let found = User::existing_ids(conn, ids).await?;

    if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
        return Err(ApiError::invalid_field(
            field,
            format!("User {} does not exist", missing),
        ));
    }

    Ok(())
}

/// Lists the boards the caller belongs to
///
/// ```json
/// [
///   {
///     "id": "uuid",
///     "title": "Sprint 12",
///     "owner_id": "uuid",
///     "member_count": 3,
///     "ticket_count": 12,
///     "tasks_to_do_count": 4,
///     "tasks_high_prio_count": 1,
///     "created_at": "2025-01-01T00:00:00Z"
///   }
/// ]
/// ```
pub async fn list_boards(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<BoardSummary>>> {
    let mut tx = state.db.begin().await?;

    let accesses = Board::accesses_for_member(&mut tx, auth.user_id, RowLock::Share).await?;
    let ids: Vec<Uuid> = gate::visible_boards(auth.user_id, &accesses)
        .into_iter()
        .map(|board| board.board_id)
        .collect();

    let summaries = Board::summaries(&mut tx, &ids).await?;
    tx.commit().await?;

    Ok(Json(summaries))
}

/// Creates a board owned by the caller
///
/// The caller is the only initial member; others are added afterwards by
/// the owner.
pub async fn create_board(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreateBoardRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BoardDetail>)> {
    let Json(req) = payload?;
    validate_request(&req)?;

    let owner_id = gate::authorize(Some(auth.user_id), Resource::NewBoard, Operation::Create)?;

    let mut tx = state.db.begin().await?;

    let board = Board::create(
        &mut tx,
        CreateBoard {
            title: req.title,
            owner_id,
        },
    )
    .await?;

    let access = BoardAccess::new(board.id, owner_id, [owner_id]);
    let detail = load_detail(&mut tx, owner_id, &access).await?;
    tx.commit().await?;

    info!(board_id = %board.id, owner_id = %owner_id, "Board created");

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(board_id): Path<Uuid>,
) -> ApiResult<Json<BoardDetail>> {
    let mut tx = state.db.begin().await?;

    let access = require_board_access(&mut tx, auth.user_id, board_id, Operation::Read).await?;
    let detail = load_detail(&mut tx, auth.user_id, &access).await?;

    tx.commit().await?;

    Ok(Json(detail))
}

/// Renames a board and/or replaces its member set
///
/// ```text
/// PATCH /api/boards/:board_id
///
/// { "title": "Sprint 13", "members": ["owner-uuid", "uuid", "uuid"] }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: `members` leaves out the owner
/// - `403 Forbidden`: a non-owner member sent `members`
/// - `404 Not Found`: board missing or caller not a member
/// - `422 Unprocessable Entity`: invalid title, or an unknown user in `members`
pub async fn update_board(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(board_id): Path<Uuid>,
    payload: Result<Json<UpdateBoardRequest>, JsonRejection>,
) -> ApiResult<Json<BoardDetail>> {
    let Json(req) = payload?;
    validate_request(&req)?;

    let mut tx = state.db.begin().await?;

    // A member-set change locks the board row exclusively up front
    let mut access = match req.members {
        Some(_) => {
            require_membership_access(&mut tx, auth.user_id, board_id, Operation::Update).await?
        }
        None => require_board_access(&mut tx, auth.user_id, board_id, Operation::Update).await?,
    };
    gate::authorize(Some(auth.user_id), Resource::Board(&access), Operation::Update)?;

    if let Some(members) = req.members {
        let change = gate::plan_member_replacement(auth.user_id, &access, members)?;
        require_users_exist(&mut tx, "members", &change.added).await?;

        if !change.is_empty() {
            BoardMember::apply(&mut tx, board_id, &change).await?;
            access = load_board_access(&mut tx, board_id, RowLock::Update).await?;

            info!(
                board_id = %board_id,
                added = change.added.len(),
                removed = change.removed.len(),
                "Board members replaced"
            );
        }
    }

    if let Some(title) = req.title {
        Board::update_title(&mut tx, board_id, &title).await?;
    }

    let detail = load_detail(&mut tx, auth.user_id, &access).await?;
    tx.commit().await?;

    Ok(Json(detail))
}

/// Deletes a board; any member may do this
pub async fn delete_board(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(board_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    require_board_access(&mut tx, auth.user_id, board_id, Operation::Delete).await?;
    Board::delete(&mut tx, board_id).await?;

    tx.commit().await?;

    info!(board_id = %board_id, user_id = %auth.user_id, "Board deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Adds one member
///
/// Answers 201 when the user was added and 200 when they already were a
/// member; the body is the resulting member list either way.
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(board_id): Path<Uuid>,
    payload: Result<Json<AddMemberRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Vec<UserSummary>>)> {
    let Json(req) = payload?;

    let mut tx = state.db.begin().await?;

    let access =
        require_membership_access(&mut tx, auth.user_id, board_id, Operation::Create).await?;
    gate::check_member_addition(auth.user_id, &access)?;
    require_users_exist(&mut tx, "user_id", &[req.user_id]).await?;

    let added = BoardMember::add(&mut tx, board_id, req.user_id).await?;
    let members = BoardMember::list_users(&mut tx, board_id).await?;

    tx.commit().await?;

    if added {
        info!(board_id = %board_id, user_id = %req.user_id, "Board member added");
        Ok((StatusCode::CREATED, Json(members)))
    } else {
        Ok((StatusCode::OK, Json(members)))
    }
}

/// Removes one member
///
/// Their assignments on the board's tasks stay as they are.
///
/// # Errors
///
/// - `400 Bad Request`: target is the owner
/// - `403 Forbidden`: caller is a member but not the owner
/// - `404 Not Found`: board missing, caller not a member, or target not a member
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((board_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let access =
        require_membership_access(&mut tx, auth.user_id, board_id, Operation::Delete).await?;
    gate::check_member_removal(auth.user_id, &access, user_id)?;

    if !BoardMember::remove(&mut tx, board_id, user_id).await? {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    tx.commit().await?;

    info!(board_id = %board_id, user_id = %user_id, "Board member removed");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_validation() {
        let ok = CreateBoardRequest {
            title: "Sprint 12".to_string(),
        };
        assert!(ok.validate().is_ok());

        let blank = CreateBoardRequest {
            title: "   ".to_string(),
        };
        assert!(blank.validate().is_err());

        let long = CreateBoardRequest {
            title: "x".repeat(101),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_create_request_ignores_members() {
        let req: CreateBoardRequest = serde_json::from_value(json!({
            "title": "Sprint 12",
            "members": [Uuid::new_v4()]
        }))
        .unwrap();

        assert_eq!(req.title, "Sprint 12");
    }

    #[test]
    fn test_update_request_fields_optional() {
        let req: UpdateBoardRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.title.is_none());
        assert!(req.members.is_none());
        assert!(req.validate().is_ok());

        let owner = Uuid::new_v4();
        let req: UpdateBoardRequest =
            serde_json::from_value(json!({ "members": [owner] })).unwrap();
        assert_eq!(req.members, Some(vec![owner]));
    }
}
