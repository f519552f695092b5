/// Access-policy properties checked over small generated worlds
///
/// No database: boards are built as `BoardAccess` snapshots and every
/// combination of actor, resource and operation is checked against the
/// membership rules directly.

use kanban_shared::auth::{
    authorization::{require_assignable, AuthzError},
    gate::{
        authorize, can_access, check_assignable, check_member_removal, filter_task_view,
        plan_member_replacement, visible_boards, visible_tasks, Assignable, AssignmentRole,
        BoardAccess, BoardScoped, Operation, Resource, TaskView,
    },
};
use std::collections::HashMap;
use uuid::Uuid;

const OPERATIONS: [Operation; 4] = [
    Operation::Read,
    Operation::Create,
    Operation::Update,
    Operation::Delete,
];

#[derive(Debug, Clone)]
struct Ticket {
    id: Uuid,
    board_id: Uuid,
    assignee_id: Option<Uuid>,
    reviewer_id: Option<Uuid>,
}

impl BoardScoped for Ticket {
    fn board_id(&self) -> Uuid {
        self.board_id
    }
}

impl Assignable for Ticket {
    fn assignee_id(&self) -> Option<Uuid> {
        self.assignee_id
    }

    fn reviewer_id(&self) -> Option<Uuid> {
        self.reviewer_id
    }
}

/// Users plus every board whose member set is a subset of them
///
/// Board `mask` bit `i` set means `users[i]` is a member; the owner is
/// `users[mask.trailing_zeros()]`.
struct World {
    users: Vec<Uuid>,
    boards: Vec<BoardAccess>,
}

fn world(user_count: usize) -> World {
    let users: Vec<Uuid> = (0..user_count).map(|_| Uuid::new_v4()).collect();

    let boards = (1u32..(1 << user_count))
        .map(|mask| {
            let members: Vec<Uuid> = users
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, user)| *user)
                .collect();
            BoardAccess::new(Uuid::new_v4(), members[0], members)
        })
        .collect();

    World { users, boards }
}

#[test]
fn test_board_and_task_access_iff_member() {
    let world = world(4);

    for board in &world.boards {
        for &user in &world.users {
            let member = board.is_member(user);

            for operation in OPERATIONS {
                if operation != Operation::Create {
                    assert_eq!(
                        can_access(Some(user), Resource::Board(board), operation),
                        member
                    );
                }
                assert_eq!(can_access(Some(user), Resource::Task(board), operation), member);
            }

            for operation in [Operation::Read, Operation::Create] {
                assert_eq!(
                    can_access(Some(user), Resource::Comments(board), operation),
                    member
                );
            }
        }
    }
}

#[test]
fn test_denials_for_outsiders_are_not_member() {
    let world = world(3);

    for board in &world.boards {
        for &user in world.users.iter().filter(|u| !board.is_member(**u)) {
            for operation in OPERATIONS {
                let result = authorize(Some(user), Resource::Task(board), operation);
                assert!(matches!(result, Err(AuthzError::NotMember(id)) if id == board.board_id));
            }
        }
    }
}

#[test]
fn test_anonymous_is_never_allowed() {
    let world = world(2);

    for board in &world.boards {
        for operation in OPERATIONS {
            assert!(matches!(
                authorize(None, Resource::Board(board), operation),
                Err(AuthzError::NotAuthenticated)
            ));
        }
    }

    assert!(matches!(
        authorize(None, Resource::NewBoard, Operation::Create),
        Err(AuthzError::NotAuthenticated)
    ));
}

#[test]
fn test_owner_is_always_member_and_never_removable() {
    let world = world(4);

    for board in &world.boards {
        assert!(board.is_member(board.owner_id));

        assert!(matches!(
            check_member_removal(board.owner_id, board, board.owner_id),
            Err(AuthzError::OwnerRemoval(_))
        ));

        let without_owner = board.members().filter(|m| *m != board.owner_id);
        assert!(matches!(
            plan_member_replacement(board.owner_id, board, without_owner),
            Err(AuthzError::OwnerRemoval(_))
        ));
    }
}

#[test]
fn test_membership_changes_owner_only() {
    let world = world(4);

    for board in &world.boards {
        for &user in &world.users {
            let allowed = can_access(Some(user), Resource::Membership(board), Operation::Update);
            assert_eq!(allowed, board.is_owner(user));

            let result = plan_member_replacement(user, board, [board.owner_id]);
            match result {
                Ok(change) => {
                    assert!(board.is_owner(user));
                    assert!(change.added.is_empty());
                    assert_eq!(change.removed.len(), board.member_count() - 1);
                }
                Err(AuthzError::NotOwner(_)) => {
                    assert!(board.is_member(user) && !board.is_owner(user))
                }
                Err(AuthzError::NotMember(_)) => assert!(!board.is_member(user)),
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
    }
}

#[test]
fn test_assignment_iff_target_is_member() {
    let world = world(4);

    for board in &world.boards {
        for &target in &world.users {
            let member = board.is_member(target);

            for role in [AssignmentRole::Assignee, AssignmentRole::Reviewer] {
                assert_eq!(check_assignable(board, role, Some(target)).is_ok(), member);
            }

            assert_eq!(require_assignable(board, Some(target), None).is_ok(), member);
            assert_eq!(require_assignable(board, None, Some(target)).is_ok(), member);
        }

        assert!(require_assignable(board, None, None).is_ok());
    }
}

#[test]
fn test_comment_mutation_iff_author() {
    let world = world(3);

    for board in &world.boards {
        for &author in &world.users {
            for &actor in &world.users {
                let comment = Resource::Comment {
                    board,
                    comment_id: Uuid::new_v4(),
                    author_id: author,
                };

                for operation in [Operation::Update, Operation::Delete] {
                    assert_eq!(can_access(Some(actor), comment, operation), actor == author);
                }
            }
        }
    }
}

#[test]
fn test_assigned_to_me_is_exactly_member_assignments() {
    let world = world(3);

    let tasks: Vec<Ticket> = world
        .boards
        .iter()
        .flat_map(|board| {
            world.users.iter().map(move |user| Ticket {
                id: Uuid::new_v4(),
                board_id: board.board_id,
                assignee_id: Some(*user),
                reviewer_id: Some(board.owner_id),
            })
        })
        .collect();

    let boards: HashMap<Uuid, BoardAccess> = world
        .boards
        .iter()
        .map(|board| (board.board_id, board.clone()))
        .collect();

    for &user in &world.users {
        let mine = filter_task_view(user, TaskView::AssignedToMe, tasks.clone(), &boards);

        let expected: Vec<Uuid> = tasks
            .iter()
            .filter(|t| t.assignee_id == Some(user) && boards[&t.board_id].is_member(user))
            .map(|t| t.id)
            .collect();
        assert_eq!(mine.iter().map(|t| t.id).collect::<Vec<_>>(), expected);

        let reviewing = filter_task_view(user, TaskView::Reviewing, tasks.clone(), &boards);
        assert!(reviewing
            .iter()
            .all(|t| t.reviewer_id == Some(user) && boards[&t.board_id].is_owner(user)));
    }
}

#[test]
fn test_visible_sets() {
    let world = world(3);

    for &user in &world.users {
        let visible = visible_boards(user, &world.boards);
        assert!(visible.iter().all(|board| board.is_member(user)));
        assert_eq!(
            visible.len(),
            world.boards.iter().filter(|b| b.is_member(user)).count()
        );

        for board in &world.boards {
            let tasks = vec![Ticket {
                id: Uuid::new_v4(),
                board_id: board.board_id,
                assignee_id: None,
                reviewer_id: None,
            }];
            let shown = visible_tasks(user, board, tasks);
            assert_eq!(shown.len(), usize::from(board.is_member(user)));
        }
    }
}

/// Alice owns a board with Bob, Bob files T1 and comments, Alice removes Bob
#[test]
fn test_removed_member_scenario() {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let before = BoardAccess::new(Uuid::new_v4(), alice, [bob]);

    assert!(authorize(Some(bob), Resource::Task(&before), Operation::Create).is_ok());
    let t1 = Ticket {
        id: Uuid::new_v4(),
        board_id: before.board_id,
        assignee_id: Some(bob),
        reviewer_id: None,
    };
    let bobs_comment = Uuid::new_v4();

    let change = plan_member_replacement(alice, &before, [alice]).unwrap();
    assert_eq!(change.removed, vec![bob]);
    let after = BoardAccess::new(before.board_id, alice, [alice]);

    assert!(matches!(
        authorize(Some(bob), Resource::Task(&after), Operation::Read),
        Err(AuthzError::NotMember(_))
    ));
    assert!(matches!(
        authorize(Some(bob), Resource::Comments(&after), Operation::Read),
        Err(AuthzError::NotMember(_))
    ));

    // The comment stays readable for the remaining members
    assert!(authorize(Some(alice), Resource::Comments(&after), Operation::Read).is_ok());
    assert!(can_access(
        Some(bob),
        Resource::Comment {
            board: &after,
            comment_id: bobs_comment,
            author_id: bob,
        },
        Operation::Delete
    ));

    let boards = HashMap::from([(after.board_id, after.clone())]);
    assert!(filter_task_view(bob, TaskView::AssignedToMe, vec![t1.clone()], &boards).is_empty());

    // The stale assignment itself is left alone
    assert_eq!(t1.assignee_id, Some(bob));
}
