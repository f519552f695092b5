/// Database models
///
/// Every operation takes `&mut PgConnection` so it can run on a pooled
/// connection or inside a request transaction (`&mut tx`). None of them
/// check permissions; that is [`crate::auth::authorization`]'s job.
///
/// # Models
///
/// - `user`: accounts and exact-match email lookup
/// - `board`: boards, summaries and membership snapshots
/// - `membership`: `board_members` rows
/// - `task`: tasks with status, priority and assignments
/// - `comment`: task comments
///
/// # Example
///
/// ```no_run
/// use kanban_shared::db::pool::{create_pool, DatabaseConfig};
/// use kanban_shared::models::board::{Board, CreateBoard};
/// use kanban_shared::models::user::{CreateUser, User};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let mut tx = pool.begin().await?;
///
/// let user = User::create(&mut tx, CreateUser {
///     email: "owner@example.com".to_string(),
///     fullname: "Board Owner".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
///
/// Board::create(&mut tx, CreateBoard {
///     title: "Sprint 12".to_string(),
///     owner_id: user.id,
/// }).await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod board;
pub mod comment;
pub mod membership;
pub mod task;
pub mod user;
