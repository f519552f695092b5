/// API route handlers, by resource
///
/// - `health`: liveness plus database and migration status
/// - `auth`: registration, login, token refresh, email availability
/// - `boards`: boards and their members
/// - `tasks`: tasks and the assigned-to-me / reviewing views
/// - `comments`: task comments
///
/// Every protected handler follows the same shape: open a transaction,
/// call one `require_*` helper from `kanban_shared::auth::authorization`,
/// do the work in the same transaction, commit. Reads too: the board row
/// lock taken by the check holds until the commit. An early `?` drops the
/// transaction, which rolls it back.

pub mod auth;
pub mod boards;
pub mod comments;
pub mod health;
pub mod tasks;

use crate::error::ApiResult;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Runs `validator` rules on a request body
pub(crate) fn validate_request<T: Validate>(req: &T) -> ApiResult<()> {
    req.validate()?;
    Ok(())
}

/// Rejects values that are empty once trimmed
///
/// Titles and comment bodies are stored trimmed.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::Borrowed("Must not be blank"));
        return Err(error);
    }

    Ok(())
}
