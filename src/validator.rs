//! Local form checks. Nothing here touches the network; a form that fails
//! validation never reaches the account directory.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Fields of the signup and signin forms, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FullName,
    Username,
    Email,
    Password,
    ConfirmPassword,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FullName => "full name",
            Self::Username => "username",
            Self::Email => "email",
            Self::Password => "password",
            Self::ConfirmPassword => "password confirmation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing {0}")]
    MissingField(Field),
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password shorter than {min} characters")]
    WeakPassword { min: usize },
    #[error("password confirmation does not match")]
    PasswordMismatch,
}

impl ValidationError {
    /// Text shown to the user in an alert.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingField(_) => "Please fill in all fields".to_string(),
            Self::InvalidEmail => "Please enter a valid email address".to_string(),
            Self::WeakPassword { min } => format!("Password must be at least {min} characters long"),
            Self::PasswordMismatch => "Passwords do not match".to_string(),
        }
    }
}

/// `local@domain.tld` with no whitespace and a single `@`.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Borrowed view of the signup form.
pub struct SignupFields<'a> {
    pub full_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a SecretString,
    pub confirm_password: &'a SecretString,
}

/// Check presence, email shape, password length and confirmation.
///
/// Password length is counted in characters, not bytes.
///
/// # Errors
///
/// Returns the first failed check.
pub fn validate_signup(
    fields: &SignupFields<'_>,
    min_password_length: usize,
) -> Result<(), ValidationError> {
    let password = fields.password.expose_secret();
    let confirm = fields.confirm_password.expose_secret();

    let required = [
        (Field::FullName, fields.full_name.trim()),
        (Field::Username, fields.username.trim()),
        (Field::Email, fields.email.trim()),
        (Field::Password, password),
        (Field::ConfirmPassword, confirm),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
        return Err(ValidationError::MissingField(*field));
    }

    if !valid_email(fields.email) {
        return Err(ValidationError::InvalidEmail);
    }

    if password.chars().count() < min_password_length {
        return Err(ValidationError::WeakPassword {
            min: min_password_length,
        });
    }

    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }

    Ok(())
}

/// Check presence and email shape of the signin form.
///
/// # Errors
///
/// Returns the first failed check.
pub fn validate_signin(email: &str, password: &SecretString) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::MissingField(Field::Email));
    }
    if password.expose_secret().is_empty() {
        return Err(ValidationError::MissingField(Field::Password));
    }
    if !valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}
