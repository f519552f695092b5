/// Middleware for the API server
///
/// - `security`: security headers on every response
///
/// Bearer authentication lives in `app::jwt_auth_layer`, on top of
/// `kanban_shared::auth::middleware`.

pub mod security;
