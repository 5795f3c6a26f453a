use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("user not found")]
    UserNotFound,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("posts can only be edited within 24 hours of creation")]
    EditWindowExpired,
    #[error("invalid or expired verification code")]
    InvalidCode,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("you are not following this user")]
    NotFollowing,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn invalid_fields(fields: Vec<FieldError>) -> Self {
        let message = fields
            .iter()
            .map(|field| field.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self::Validation { message, fields }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.into())
    }
}

/// Name of the violated constraint when `err` is a unique violation (SQLSTATE 23505).
pub fn unique_violation(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    Some(db_err.constraint().unwrap_or_default().to_string())
}

/// Name of the violated constraint when `err` is a foreign key violation (SQLSTATE 23503).
pub fn foreign_key_violation(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() != Some("23503") {
        return None;
    }
    Some(db_err.constraint().unwrap_or_default().to_string())
}

/// Foreign keys from rows a user writes on their own behalf to `users`, as Postgres names
/// inline `REFERENCES` constraints.
const ACTING_USER_FOREIGN_KEYS: &[&str] = &[
    "posts_author_id_fkey",
    "comments_author_id_fkey",
    "likes_user_id_fkey",
    "favorites_user_id_fkey",
    "follows_follower_id_fkey",
];

/// A write by an account deleted after its access token was issued fails its user foreign key;
/// that surfaces as `UserNotFound`, everything else stays internal.
pub fn acting_user_missing(err: sqlx::Error) -> ServiceError {
    match foreign_key_violation(&err) {
        Some(constraint) if ACTING_USER_FOREIGN_KEYS.contains(&constraint.as_str()) => {
            ServiceError::UserNotFound
        }
        _ => err.into(),
    }
}

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

pub fn check_password_policy(field: &'static str, password: &str) -> ServiceResult<()> {
    if password.trim().chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::invalid_fields(vec![FieldError::new(
            field,
            "password must be at least 8 characters",
        )]));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ServiceError::invalid_fields(vec![FieldError::new(
            field,
            "password must be at most 128 characters",
        )]));
    }
    Ok(())
}
