/// Loading membership snapshots and applying the Gate
///
/// These helpers are what route handlers call. Each one:
///
/// 1. Resolves the resource (board, task or comment) inside the caller's
///    connection, usually a request transaction
/// 2. Loads the board's [`BoardAccess`] snapshot, row-locking the board
/// 3. Asks [`super::gate`] for a decision
///
/// and returns what was loaded, so the handler can carry on in the same
/// transaction without reading anything twice.
///
/// # Locking
///
/// | Request                         | Board row lock |
/// |---------------------------------|----------------|
/// | board/task/comment read or write| `FOR SHARE`    |
/// | membership change               | `FOR UPDATE`   |
///
/// The lock lasts until the transaction ends, so a membership change waits
/// for in-flight guarded requests on the same board, and vice versa. Run
/// the check and the data access in one transaction.
///
/// # Example
///
/// ```no_run
/// use kanban_shared::auth::authorization::{require_task_access, AuthzError};
/// use kanban_shared::auth::gate::Operation;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// async fn delete_task(pool: &PgPool, actor: Uuid, task_id: Uuid) -> Result<(), AuthzError> {
///     let mut tx = pool.begin().await?;
///     let (task, _board) = require_task_access(&mut tx, actor, task_id, Operation::Delete).await?;
///     kanban_shared::models::task::Task::delete(&mut tx, task.id).await?;
///     tx.commit().await?;
///     Ok(())
/// }
/// ```

use sqlx::PgConnection;
use uuid::Uuid;

use super::gate::{self, AssignmentRole, BoardAccess, Operation, Resource};
use crate::models::board::{Board, RowLock};
use crate::models::comment::Comment;
use crate::models::task::Task;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// No caller identity
    #[error("Authentication required")]
    NotAuthenticated,

    /// Caller is not a member of the board
    #[error("Not a member of board {0}")]
    NotMember(Uuid),

    /// Member attempting an owner-only membership change
    #[error("Only the owner of board {0} can change its members")]
    NotOwner(Uuid),

    /// Member attempting to change someone else's comment
    #[error("Only the author can modify comment {0}")]
    NotAuthor(Uuid),

    /// Assignee/reviewer is not a member of the board
    #[error("{role} {user_id} is not a member of board {board_id}")]
    InvalidReference {
        role: AssignmentRole,
        user_id: Uuid,
        board_id: Uuid,
    },

    /// Attempt to drop the owner from the member set
    #[error("The owner cannot be removed from board {0}")]
    OwnerRemoval(Uuid),

    /// Referenced resource does not exist
    #[error("{0} not found")]
    ResourceNotFound(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Lock held on the board by every board, task and comment check
const GUARD_LOCK: RowLock = RowLock::Share;

/// Loads the membership snapshot of a board
///
/// # Errors
///
/// Returns `AuthzError::ResourceNotFound` if the board does not exist
pub async fn load_board_access(
    conn: &mut PgConnection,
    board_id: Uuid,
    lock: RowLock,
) -> Result<BoardAccess, AuthzError> {
    Board::access(conn, board_id, lock)
        .await?
        .ok_or(AuthzError::ResourceNotFound("Board"))
}

/// Requires `operation` on the board itself
///
/// # Returns
///
/// The board's membership snapshot
///
/// # Example
///
/// ```no_run
/// # use kanban_shared::auth::authorization::require_board_access;
/// # use kanban_shared::auth::gate::Operation;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
/// # async fn example(pool: PgPool, actor: Uuid, board_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let mut tx = pool.begin().await?;
/// let access = require_board_access(&mut tx, actor, board_id, Operation::Read).await?;
/// assert!(access.is_member(actor));
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub async fn require_board_access(
    conn: &mut PgConnection,
    actor: Uuid,
    board_id: Uuid,
    operation: Operation,
) -> Result<BoardAccess, AuthzError> {
    let access = load_board_access(conn, board_id, GUARD_LOCK).await?;
    gate::authorize(Some(actor), Resource::Board(&access), operation)?;

    Ok(access)
}

/// Requires `operation` on the board's member set
///
/// Mutations lock the board row `FOR UPDATE`, reads `FOR SHARE`. Owner-target and
/// replacement-set checks stay with the callers, via
/// [`gate::check_member_removal`] and [`gate::plan_member_replacement`],
/// once they hold this snapshot.
pub async fn require_membership_access(
    conn: &mut PgConnection,
    actor: Uuid,
    board_id: Uuid,
    operation: Operation,
) -> Result<BoardAccess, AuthzError> {
    let lock = if operation.is_mutation() {
        RowLock::Update
    } else {
        RowLock::Share
    };

    let access = load_board_access(conn, board_id, lock).await?;
    gate::authorize(Some(actor), Resource::Membership(&access), operation)?;

    Ok(access)
}

/// Requires `operation` on an existing task
///
/// # Returns
///
/// The task and its board's membership snapshot
///
/// # Errors
///
/// - `ResourceNotFound("Task")` if the task does not exist
/// - `NotMember` if the actor is outside the task's board
pub async fn require_task_access(
    conn: &mut PgConnection,
    actor: Uuid,
    task_id: Uuid,
    operation: Operation,
) -> Result<(Task, BoardAccess), AuthzError> {
    let task = Task::find_by_id(conn, task_id)
        .await?
        .ok_or(AuthzError::ResourceNotFound("Task"))?;

    let access = load_board_access(conn, task.board_id, GUARD_LOCK).await?;
    gate::authorize(Some(actor), Resource::Task(&access), operation)?;

    Ok((task, access))
}

/// Requires `operation` on the comment collection of a task
///
/// Used for listing and creating comments.
pub async fn require_comments_access(
    conn: &mut PgConnection,
    actor: Uuid,
    task_id: Uuid,
    operation: Operation,
) -> Result<(Task, BoardAccess), AuthzError> {
    let task = Task::find_by_id(conn, task_id)
        .await?
        .ok_or(AuthzError::ResourceNotFound("Task"))?;

    let access = load_board_access(conn, task.board_id, GUARD_LOCK).await?;
    gate::authorize(Some(actor), Resource::Comments(&access), operation)?;

    Ok((task, access))
}

/// Requires `operation` on one comment of a task
///
/// Update and delete are granted to the author alone. A comment that
/// exists but belongs to a different task is reported as not found.
pub async fn require_comment_access(
    conn: &mut PgConnection,
    actor: Uuid,
    task_id: Uuid,
    comment_id: Uuid,
    operation: Operation,
) -> Result<(Comment, BoardAccess), AuthzError> {
    let task = Task::find_by_id(conn, task_id)
        .await?
        .ok_or(AuthzError::ResourceNotFound("Task"))?;

    let access = load_board_access(conn, task.board_id, GUARD_LOCK).await?;

    let comment = match Comment::find(conn, task.id, comment_id).await? {
        Some(comment) => comment,
        None => {
            // Outsiders get the same answer whether or not the comment exists
            gate::authorize(Some(actor), Resource::Comments(&access), Operation::Read)?;
            return Err(AuthzError::ResourceNotFound("Comment"));
        }
    };

    gate::authorize(
        Some(actor),
        Resource::Comment {
            board: &access,
            comment_id: comment.id,
            author_id: comment.author_id,
        },
        operation,
    )?;

    Ok((comment, access))
}

/// Requires assignee and reviewer to be members of the board
///
/// `None` means the slot is not being set and is not checked.
pub fn require_assignable(
    board: &BoardAccess,
    assignee_id: Option<Uuid>,
    reviewer_id: Option<Uuid>,
) -> Result<(), AuthzError> {
    gate::check_assignable(board, AssignmentRole::Assignee, assignee_id)?;
    gate::check_assignable(board, AssignmentRole::Reviewer, reviewer_id)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_assignable() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let board = BoardAccess::new(Uuid::new_v4(), owner, [member]);

        assert!(require_assignable(&board, Some(member), Some(owner)).is_ok());
        assert!(require_assignable(&board, None, None).is_ok());

        let err = require_assignable(&board, Some(member), Some(outsider)).unwrap_err();
        assert!(matches!(
            err,
            AuthzError::InvalidReference {
                role: AssignmentRole::Reviewer,
                ..
            }
        ));
    }

    #[test]
    fn test_error_messages() {
        let board_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let err = AuthzError::InvalidReference {
            role: AssignmentRole::Assignee,
            user_id,
            board_id,
        };

        assert_eq!(
            err.to_string(),
            format!("assignee {} is not a member of board {}", user_id, board_id)
        );
        assert_eq!(AuthzError::ResourceNotFound("Board").to_string(), "Board not found");
    }
}
