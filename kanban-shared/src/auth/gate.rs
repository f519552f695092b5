/// Board-scoped access policy
///
/// Every decision about boards, tasks and comments goes through this module.
/// It is a pure function of:
///
/// 1. **Actor**: the authenticated user id (passed explicitly, never ambient)
/// 2. **Resource**: what is being touched, carrying the board's [`BoardAccess`] snapshot
/// 3. **Operation**: read, create, update or delete
///
/// Nothing here performs I/O. Snapshots are loaded by
/// [`super::authorization`] inside the request transaction and handed in.
///
/// # Rules
///
/// | Resource            | Read   | Create | Update | Delete |
/// |---------------------|--------|--------|--------|--------|
/// | Board               | member | any    | member | member |
/// | Board membership    | member | owner  | owner  | owner  |
/// | Task                | member | member | member | member |
/// | Task comments       | member | member | -      | -      |
/// | Single comment      | member | member | author | author |
///
/// # Example
///
/// ```
/// use kanban_shared::auth::gate::{authorize, BoardAccess, Operation, Resource};
/// use uuid::Uuid;
///
/// let owner = Uuid::new_v4();
/// let outsider = Uuid::new_v4();
/// let board = BoardAccess::new(Uuid::new_v4(), owner, []);
///
/// assert!(authorize(Some(owner), Resource::Task(&board), Operation::Create).is_ok());
/// assert!(authorize(Some(outsider), Resource::Board(&board), Operation::Read).is_err());
/// ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::authorization::AuthzError;

/// Operation requested on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// True for anything that writes
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Read)
    }
}

/// Membership snapshot of a single board
///
/// The owner is always part of the member set, whatever the caller passes in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardAccess {
    /// Board the snapshot describes
    pub board_id: Uuid,

    /// Board owner
    pub owner_id: Uuid,

    members: HashSet<Uuid>,
}

impl BoardAccess {
    /// Builds a snapshot, inserting the owner into the member set
    pub fn new(board_id: Uuid, owner_id: Uuid, members: impl IntoIterator<Item = Uuid>) -> Self {
        let mut members: HashSet<Uuid> = members.into_iter().collect();
        members.insert(owner_id);

        Self {
            board_id,
            owner_id,
            members,
        }
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Member ids (owner included)
    pub fn members(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.members.iter().copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Resource an actor wants to operate on
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// A board that is about to be created
    NewBoard,

    /// The board itself (title, deletion, detail view)
    Board(&'a BoardAccess),

    /// The member set of a board
    Membership(&'a BoardAccess),

    /// A task on the board (existing or to be created)
    Task(&'a BoardAccess),

    /// The comment collection of a task on the board
    Comments(&'a BoardAccess),

    /// One existing comment
    Comment {
        board: &'a BoardAccess,
        comment_id: Uuid,
        author_id: Uuid,
    },
}

impl Resource<'_> {
    fn board(&self) -> Option<&BoardAccess> {
        match self {
            Resource::NewBoard => None,
            Resource::Board(board)
            | Resource::Membership(board)
            | Resource::Task(board)
            | Resource::Comments(board)
            | Resource::Comment { board, .. } => Some(board),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Resource::NewBoard | Resource::Board(_) => "board",
            Resource::Membership(_) => "membership",
            Resource::Task(_) => "task",
            Resource::Comments(_) | Resource::Comment { .. } => "comment",
        }
    }
}

/// Decides whether `actor` may perform `operation` on `resource`
///
/// Returns the actor id on success so callers can chain on it.
///
/// # Errors
///
/// - `NotAuthenticated` when there is no actor
/// - `NotMember` when the actor is outside the board
/// - `NotOwner` when a non-owner member changes the member set
/// - `NotAuthor` when a member edits or deletes someone else's comment
pub fn authorize(
    actor: Option<Uuid>,
    resource: Resource<'_>,
    operation: Operation,
) -> Result<Uuid, AuthzError> {
    let actor = actor.ok_or(AuthzError::NotAuthenticated)?;

    let decision = decide(actor, resource, operation);

    if let Err(ref err) = decision {
        debug!(
            actor = %actor,
            board_id = ?resource.board().map(|b| b.board_id),
            resource = resource.kind(),
            operation = operation.as_str(),
            reason = %err,
            "Access denied"
        );
    }

    decision.map(|()| actor)
}

/// Boolean form of [`authorize`]
pub fn can_access(actor: Option<Uuid>, resource: Resource<'_>, operation: Operation) -> bool {
    authorize(actor, resource, operation).is_ok()
}

fn decide(actor: Uuid, resource: Resource<'_>, operation: Operation) -> Result<(), AuthzError> {
    match resource {
        Resource::NewBoard => Ok(()),

        Resource::Board(board) | Resource::Task(board) | Resource::Comments(board) => {
            require_member(actor, board)
        }

        Resource::Membership(board) => {
            require_member(actor, board)?;
            if operation.is_mutation() && !board.is_owner(actor) {
                return Err(AuthzError::NotOwner(board.board_id));
            }
            Ok(())
        }

        Resource::Comment {
            board,
            comment_id,
            author_id,
        } => match operation {
            Operation::Read | Operation::Create => require_member(actor, board),
            Operation::Update | Operation::Delete => {
                // Authorship alone grants edit/delete, board role does not matter
                if actor == author_id {
                    return Ok(());
                }
                require_member(actor, board)?;
                Err(AuthzError::NotAuthor(comment_id))
            }
        },
    }
}

fn require_member(actor: Uuid, board: &BoardAccess) -> Result<(), AuthzError> {
    if board.is_member(actor) {
        Ok(())
    } else {
        Err(AuthzError::NotMember(board.board_id))
    }
}

/// Slot a user can be referenced from on a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentRole {
    Assignee,
    Reviewer,
}

impl AssignmentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentRole::Assignee => "assignee",
            AssignmentRole::Reviewer => "reviewer",
        }
    }

    /// Request field carrying this reference
    pub fn field(&self) -> &'static str {
        match self {
            AssignmentRole::Assignee => "assignee_id",
            AssignmentRole::Reviewer => "reviewer_id",
        }
    }
}

impl fmt::Display for AssignmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks that `target` may be referenced as assignee/reviewer on `board`
///
/// Clearing the slot (`None`) is always allowed. The target is never added
/// to the board as a side effect.
pub fn check_assignable(
    board: &BoardAccess,
    role: AssignmentRole,
    target: Option<Uuid>,
) -> Result<(), AuthzError> {
    match target {
        Some(user_id) if !board.is_member(user_id) => Err(AuthzError::InvalidReference {
            role,
            user_id,
            board_id: board.board_id,
        }),
        _ => Ok(()),
    }
}

/// Difference between a board's current member set and a requested one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    /// Users to insert, sorted
    pub added: Vec<Uuid>,

    /// Users to delete, sorted
    pub removed: Vec<Uuid>,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Plans replacing a board's member set with `desired`
///
/// Only the owner may do this and the owner must stay in the set.
pub fn plan_member_replacement(
    actor: Uuid,
    board: &BoardAccess,
    desired: impl IntoIterator<Item = Uuid>,
) -> Result<MembershipChange, AuthzError> {
    authorize(Some(actor), Resource::Membership(board), Operation::Update)?;

    let desired: BTreeSet<Uuid> = desired.into_iter().collect();
    if !desired.contains(&board.owner_id) {
        return Err(AuthzError::OwnerRemoval(board.board_id));
    }

    let current: BTreeSet<Uuid> = board.members().collect();

    Ok(MembershipChange {
        added: desired.difference(&current).copied().collect(),
        removed: current.difference(&desired).copied().collect(),
    })
}

/// Checks that `actor` may add a member to `board`
pub fn check_member_addition(actor: Uuid, board: &BoardAccess) -> Result<(), AuthzError> {
    authorize(Some(actor), Resource::Membership(board), Operation::Create).map(|_| ())
}

/// Checks that `actor` may remove `target` from `board`
pub fn check_member_removal(
    actor: Uuid,
    board: &BoardAccess,
    target: Uuid,
) -> Result<(), AuthzError> {
    authorize(Some(actor), Resource::Membership(board), Operation::Delete)?;

    if board.is_owner(target) {
        return Err(AuthzError::OwnerRemoval(board.board_id));
    }

    Ok(())
}

/// Anything that lives on exactly one board
pub trait BoardScoped {
    fn board_id(&self) -> Uuid;
}

/// Board-scoped items with assignee/reviewer references
pub trait Assignable: BoardScoped {
    fn assignee_id(&self) -> Option<Uuid>;
    fn reviewer_id(&self) -> Option<Uuid>;
}

impl BoardScoped for BoardAccess {
    fn board_id(&self) -> Uuid {
        self.board_id
    }
}

/// Derived task list of the current user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskView {
    /// Tasks where the actor is the assignee
    AssignedToMe,

    /// Tasks where the actor is the reviewer
    Reviewing,
}

impl TaskView {
    fn matches<T: Assignable>(&self, actor: Uuid, task: &T) -> bool {
        match self {
            TaskView::AssignedToMe => task.assignee_id() == Some(actor),
            TaskView::Reviewing => task.reviewer_id() == Some(actor),
        }
    }
}

/// Keeps the boards `actor` is a member of
pub fn visible_boards<'a>(
    actor: Uuid,
    boards: impl IntoIterator<Item = &'a BoardAccess>,
) -> Vec<&'a BoardAccess> {
    boards
        .into_iter()
        .filter(|board| board.is_member(actor))
        .collect()
}

/// Keeps the tasks of `board` that `actor` may see
///
/// Empty when the actor is not a member. Items belonging to another board
/// are dropped as well.
pub fn visible_tasks<T: BoardScoped>(actor: Uuid, board: &BoardAccess, tasks: Vec<T>) -> Vec<T> {
    if !board.is_member(actor) {
        return Vec::new();
    }

    tasks
        .into_iter()
        .filter(|task| task.board_id() == board.board_id)
        .collect()
}

/// Applies a derived task view
///
/// A task is returned only if it matches the view *and* the actor is
/// currently a member of the task's board, according to `boards`. A task
/// whose board is missing from `boards` is dropped.
pub fn filter_task_view<T: Assignable>(
    actor: Uuid,
    view: TaskView,
    tasks: Vec<T>,
    boards: &HashMap<Uuid, BoardAccess>,
) -> Vec<T> {
    tasks
        .into_iter()
        .filter(|task| view.matches(actor, task))
        .filter(|task| {
            boards
                .get(&task.board_id())
                .is_some_and(|board| board.is_member(actor))
        })
        .collect()
}
