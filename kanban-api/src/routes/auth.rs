/// Account endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/registration` - Create an account and get tokens
/// - `POST /api/auth/login` - Exchange credentials for tokens
/// - `POST /api/auth/refresh` - Exchange a refresh token for an access token
/// - `GET /api/auth/email-check?email=...` - Is an address still free

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::validate_request,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use kanban_shared::{
    auth::{jwt, password},
    models::user::{CreateUser, User},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegistrationRequest {
    #[validate(length(min = 1, max = 150, message = "Full name must be 1 to 150 characters"))]
    pub fullname: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    pub repeated_password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Tokens plus the account they belong to
///
/// Returned by both registration and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Access token (24h)
    pub token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    pub fullname: String,
    pub email: String,
    pub user_id: Uuid,
}

impl AuthResponse {
    fn new(user: &User, tokens: jwt::TokenPair) -> Self {
        Self {
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            user_id: user.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub token: String,
}

/// Same address rules as registration
#[derive(Debug, Deserialize, Validate)]
pub struct EmailCheckQuery {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmailCheckResponse {
    /// The address exactly as it was looked up
    pub email: String,
    pub available: bool,
}

/// Registers a new account
///
/// ```text
/// POST /api/auth/registration
///
/// {
///   "fullname": "Alice Example",
///   "email": "alice@example.com",
///   "password": "Secur3P@ss",
///   "repeated_password": "Secur3P@ss"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: malformed body
/// - `409 Conflict`: email already registered
/// - `422 Unprocessable Entity`: validation failed, passwords differ or
///   the password is too weak
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let Json(req) = payload?;
    validate_request(&req)?;

    if req.password != req.repeated_password {
        return Err(ApiError::invalid_field(
            "repeated_password",
            "Passwords do not match",
        ));
    }

    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid_field("password", message))?;

    let mut tx = state.db.begin().await?;

    if User::email_exists(&mut tx, &req.email).await? {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    // A concurrent registration still trips the unique constraint -> 409
    let user = User::create(
        &mut tx,
        CreateUser {
            email: req.email,
            fullname: req.fullname,
            password_hash,
        },
    )
    .await?;

    tx.commit().await?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse::new(&user, tokens))))
}

/// Logs in with email and password
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(req) = payload?;
    validate_request(&req)?;

    let mut conn = state.db.acquire().await?;

    let user = User::find_by_email(&mut conn, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_login(&mut conn, user.id).await?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse::new(&user, tokens)))
}

/// Exchanges a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: invalid or expired token, or an access token was
///   sent instead of a refresh token
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<RefreshResponse>> {
    let Json(req) = payload?;

    let token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { token }))
}

/// Reports whether an email address is still free
///
/// Public. Only a boolean is disclosed, never the account behind it. The
/// lookup is exact, the same one registration uses for its duplicate check:
/// no trimming and case-sensitive.
///
/// ```text
/// GET /api/auth/email-check?email=alice@example.com
///
/// { "email": "alice@example.com", "available": false }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: `email` parameter missing or blank
/// - `422 Unprocessable Entity`: not an address registration would accept
pub async fn email_check(
    State(state): State<AppState>,
    query: Result<Query<EmailCheckQuery>, QueryRejection>,
) -> ApiResult<Json<EmailCheckResponse>> {
    let Query(query) = query?;

    let Some(email) = query.email.as_deref().filter(|email| !email.trim().is_empty()) else {
        return Err(ApiError::BadRequest(
            "Missing required parameter: email".to_string(),
        ));
    };
    validate_request(&query)?;

    let mut conn = state.db.acquire().await?;
    let exists = User::email_exists(&mut conn, email).await?;

    Ok(Json(EmailCheckResponse {
        email: email.to_string(),
        available: !exists,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(password: &str, repeated: &str) -> RegistrationRequest {
        RegistrationRequest {
            fullname: "Alice Example".to_string(),
            email: "alice@example.com".to_string(),
            password: password.to_string(),
            repeated_password: repeated.to_string(),
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration("Secur3P@ss", "Secur3P@ss").validate().is_ok());

        let mut bad_email = registration("Secur3P@ss", "Secur3P@ss");
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());

        let mut no_name = registration("Secur3P@ss", "Secur3P@ss");
        no_name.fullname = String::new();
        assert!(no_name.validate().is_err());
    }

    #[test]
    fn test_padded_email_rejected_on_both_paths() {
        let mut padded = registration("Secur3P@ss", "Secur3P@ss");
        padded.email = " alice@example.com".to_string();
        assert!(padded.validate().is_err());

        let check = EmailCheckQuery {
            email: Some(" alice@example.com".to_string()),
        };
        assert!(check.validate().is_err());

        let check = EmailCheckQuery {
            email: Some("Alice@Example.com".to_string()),
        };
        assert!(check.validate().is_ok());
    }

    #[test]
    fn test_auth_response_shape() {
        let user = User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            fullname: "Alice Example".to_string(),
            password_hash: "hash".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            last_login_at: None,
        };
        let tokens = jwt::TokenPair {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 86400,
        };

        let json = serde_json::to_value(AuthResponse::new(&user, tokens)).unwrap();
        assert_eq!(json["token"], "access");
        assert_eq!(json["refresh_token"], "refresh");
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["user_id"], user.id.to_string());
        assert!(json.get("password_hash").is_none());
    }
}
