use crate::ids::{ParseError, UserId};
use serde::Serialize;

pub const EMAIL_MAX_LEN: usize = 256;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Encoded password digest; never serialized into API responses.
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub subscribed: bool,
    pub billing_customer_id: Option<String>,
    pub created_at: i64,
}

pub fn validate_email_address(email: &str) -> Result<(), ParseError> {
    if email.trim().is_empty() {
        return Err(ParseError::Empty("email"));
    }
    if email.len() > EMAIL_MAX_LEN {
        return Err(ParseError::TooLong("email", EMAIL_MAX_LEN));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ParseError::InvalidFormat("email must contain '@'"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ParseError::InvalidFormat("email has an invalid shape"));
    }
    Ok(())
}
