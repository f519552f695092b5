/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; every error becomes a JSON body
/// `{ "error": code, "message": text, "details"?: [...] }` with a matching
/// status code.
///
/// Access denials follow one rule: a caller who is not a member of a board
/// cannot tell its board, tasks or comments apart from ones that do not
/// exist, so `NotMember` and `ResourceNotFound` both become 404.
///
/// # Example
///
/// ```
/// use kanban_api::error::{ApiError, ApiResult};
///
/// fn parse_limit(raw: &str) -> ApiResult<u32> {
///     raw.parse()
///         .map_err(|_| ApiError::BadRequest(format!("invalid limit: {}", raw)))
/// }
///
/// assert!(parse_limit("10").is_ok());
/// assert!(parse_limit("ten").is_err());
/// ```

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kanban_shared::auth::{
    authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError,
};
use kanban_shared::models::user::EMAIL_UNIQUE_CONSTRAINT;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 404
    NotFound(String),

    /// 409, e.g. duplicate email
    Conflict(String),

    /// 422 with per-field details
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500, logged, message hidden from the client
    InternalError(String),

    /// 503
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code, e.g. "not_found"
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::InternalError(_) => "internal_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.code().to_string();

        let (message, details) = match self {
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), Some(errors))
            }
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), None)
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, None),
        };

        let body = Json(ErrorResponse {
            error,
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) {
                    return ApiError::Conflict("Email already exists".to_string());
                }
                if db_err.is_unique_violation() {
                    return ApiError::Conflict("Resource already exists".to_string());
                }
                if db_err.is_foreign_key_violation() {
                    return ApiError::BadRequest("Referenced resource does not exist".to_string());
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is busy, try again".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotAuthenticated => {
                ApiError::Unauthorized("Authentication required".to_string())
            }
            // One body for both: an outsider cannot tell a foreign id from a missing one
            AuthzError::NotMember(_) | AuthzError::ResourceNotFound(_) => {
                ApiError::NotFound("Resource not found".to_string())
            }
            AuthzError::NotOwner(_) => {
                ApiError::Forbidden("Only the board owner can change its members".to_string())
            }
            AuthzError::NotAuthor(_) => {
                ApiError::Forbidden("Only the author can modify this comment".to_string())
            }
            AuthzError::InvalidReference { role, .. } => ApiError::invalid_field(
                role.field(),
                format!("The {} must be a member of the board", role),
            ),
            AuthzError::OwnerRemoval(_) => {
                ApiError::BadRequest("The board owner cannot be removed from the board".to_string())
            }
            AuthzError::DatabaseError(err) => ApiError::from(err),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => {
                ApiError::Unauthorized("Invalid token issuer".to_string())
            }
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code));
                    ValidationErrorDetail::new(field.to_string(), message)
                })
            })
            .collect();

        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_shared::auth::gate::AssignmentRole;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Task not found".to_string());
        assert_eq!(err.to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_authz_mapping_hides_non_membership() {
        let not_member = ApiError::from(AuthzError::NotMember(Uuid::new_v4()));
        let missing = ApiError::from(AuthzError::ResourceNotFound("Board"));

        assert_eq!(not_member.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_member.to_string(), missing.to_string());
    }

    #[test]
    fn test_authz_mapping() {
        let cases = [
            (AuthzError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (AuthzError::NotOwner(Uuid::new_v4()), StatusCode::FORBIDDEN),
            (AuthzError::NotAuthor(Uuid::new_v4()), StatusCode::FORBIDDEN),
            (AuthzError::OwnerRemoval(Uuid::new_v4()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_invalid_reference_names_field() {
        let err = ApiError::from(AuthzError::InvalidReference {
            role: AssignmentRole::Reviewer,
            user_id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
        });

        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "reviewer_id");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_error() {
        let err = ApiError::ValidationError(vec![
            ValidationErrorDetail::new("email", "Invalid email format"),
            ValidationErrorDetail::new("password", "Password too short"),
        ]);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_error_hides_message() {
        let response = ApiError::InternalError("secret detail".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_jwt_mapping() {
        assert_eq!(ApiError::from(JwtError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(JwtError::CreateError("x".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
