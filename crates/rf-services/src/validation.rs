//! Input normalization and length/format bounds.

use std::sync::OnceLock;

use regex::Regex;
use rf_core::error::{AppError, Result};

pub const USERNAME_CHARS: (usize, usize) = (3, 30);
pub const PASSWORD_CHARS: (usize, usize) = (6, 50);
pub const POST_TITLE_CHARS: (usize, usize) = (5, 100);
pub const POST_CONTENT_CHARS: (usize, usize) = (10, 5000);
pub const COMMENT_CHARS: (usize, usize) = (2, 1000);
pub const CATEGORY_NAME_CHARS: (usize, usize) = (1, 50);
pub const REPORT_REASON_CHARS: (usize, usize) = (1, 500);

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .unwrap_or_else(|err| unreachable!("email pattern is a literal: {err}"))
    })
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trimmed, lowercased, with every whitespace character removed.
pub fn normalize_username(username: &str) -> String {
    username
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Character count (not bytes) must fall inside `bounds`, inclusive.
pub fn check_length(field: &str, value: &str, bounds: (usize, usize)) -> Result<()> {
    let (min, max) = bounds;
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::ValidationError(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

/// Expects an already normalized email.
pub fn check_email(email: &str) -> Result<()> {
    if !email_pattern().is_match(email) {
        return Err(AppError::ValidationError("email is not a valid address".into()));
    }
    Ok(())
}
