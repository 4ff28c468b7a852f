//! # AppError
//!
//! Centralized error handling for the Rusty-Forum ecosystem.
//! Maps domain-specific failures to actionable error types.

use std::fmt::Display;

use thiserror::Error;

/// The primary error type for all rf-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed input (e.g., username too short, invalid email)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Uniqueness violation (e.g., email or username already registered)
    #[error("already taken: {0}")]
    AlreadyTaken(String),

    /// No session, or the session is invalid
    #[error("authentication required")]
    Unauthenticated,

    /// Valid session, insufficient role or ownership
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (e.g., Post, Comment, Session)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Session row exists but its expiry has passed
    #[error("session expired")]
    Expired,

    /// Stored hash did not match the supplied password
    #[error("invalid password")]
    BadPassword,

    /// Login failed; deliberately does not say which half was wrong
    #[error("invalid username or password")]
    BadCredentials,

    /// Login throttle engaged
    #[error("too many failed attempts, try again later")]
    TooManyAttempts,

    /// Persistence failure. Carries the operation label only; details are logged where they occur.
    #[error("internal service error")]
    Storage(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl Display) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    pub fn storage(operation: impl Into<String>) -> Self {
        AppError::Storage(operation.into())
    }
}

/// A specialized Result type for Rusty-Forum logic.
pub type Result<T> = std::result::Result<T, AppError>;
