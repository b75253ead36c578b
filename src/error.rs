use thiserror::Error;

use crate::models::Status;

/// Failures a user can cause. Messages are shown verbatim on the CLI.
#[derive(Debug, Error)]
pub enum GrievanceError {
    #[error("Please fill in all required fields.")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("Username or email already exists")]
    DuplicateAccount,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Access denied. Admin privileges required.")]
    AccessDenied,
    #[error("grievance {0} not found")]
    NotFound(uuid::Uuid),
    #[error("status change from {from} to {to} is not allowed")]
    InvalidTransition { from: Status, to: Status },
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i32),
    #[error("only the original submitter can rate a grievance")]
    NotSubmitter,
    #[error("a grievance can only be rated once it is resolved")]
    NotResolved,
    #[error("unknown {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },
}
