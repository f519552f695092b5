/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access/refresh token issuing and validation
/// - [`middleware`]: bearer-token authentication and the `AuthContext` extractor
/// - [`gate`]: the pure board-scoped access policy
/// - [`authorization`]: snapshot loading plus Gate decisions for handlers
///
/// # Example
///
/// ```
/// use kanban_shared::auth::gate::{can_access, BoardAccess, Operation, Resource};
/// use kanban_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Correct-Horse1")?;
/// assert!(verify_password("Correct-Horse1", &hash)?);
///
/// let owner = Uuid::new_v4();
/// let board = BoardAccess::new(Uuid::new_v4(), owner, []);
/// assert!(can_access(Some(owner), Resource::Membership(&board), Operation::Update));
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod gate;
pub mod jwt;
pub mod middleware;
pub mod password;
