/// Bearer-token authentication for Axum
///
/// [`authenticate`] reads `Authorization: Bearer <token>` and validates it as
/// an access token. A middleware layer stores the resulting [`AuthContext`]
/// in the request extensions; handlers then take `AuthContext` as an
/// extractor, and a request that reached a handler without one is rejected
/// with 401.
///
/// The context only says *who* the caller is. What they may touch is decided
/// per request by [`super::gate`].
///
/// # Example
///
/// ```no_run
/// use axum::{extract::Request, middleware::{self, Next}, response::Response, routing::get, Router};
/// use kanban_shared::auth::middleware::{authenticate, AuthContext, AuthError};
///
/// async fn require_bearer(mut req: Request, next: Next) -> Result<Response, AuthError> {
///     let context = authenticate(req.headers(), "secret")?;
///     req.extensions_mut().insert(context);
///     Ok(next.run(req).await)
/// }
///
/// async fn whoami(auth: AuthContext) -> String {
///     auth.user_id.to_string()
/// }
///
/// let app: Router = Router::new()
///     .route("/me", get(whoami))
///     .layer(middleware::from_fn(require_bearer));
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Error type for authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat(String),

    /// Token rejected (signature, expiry, issuer or type)
    InvalidToken(String),
}

impl AuthError {
    pub fn message(&self) -> &str {
        match self {
            AuthError::MissingCredentials => "Missing authorization header",
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => msg,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
            JwtError::WrongTokenType { .. } => {
                AuthError::InvalidToken("Expected an access token".to_string())
            }
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        };

        let body = Json(serde_json::json!({
            "error": "unauthorized",
            "message": self.message(),
        }));

        (status, body).into_response()
    }
}

/// Extracts the raw bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Authorization header is not ASCII".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Resolves the caller from request headers
///
/// # Errors
///
/// - `AuthError::MissingCredentials` without an `Authorization` header
/// - `AuthError::InvalidFormat` if it is not a bearer token
/// - `AuthError::InvalidToken` if the token does not validate as an access token
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_access_token(token, secret)?;

    Ok(AuthContext::new(claims.sub))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}
