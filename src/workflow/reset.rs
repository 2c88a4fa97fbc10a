//! Password reset trigger.

use crate::{
    directory::AccountDirectory,
    validator::{valid_email, Field, ValidationError},
};
use tracing::{error, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResetError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("reset request failed: {0}")]
    Backend(String),
}

impl ResetError {
    /// Text shown to the user in an alert; backend detail is surfaced as is.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.user_message(),
            Self::Backend(detail) => format!("Failed to send reset email: {detail}"),
        }
    }
}

/// Ask the directory to send a reset link to `email`.
///
/// # Errors
///
/// Returns a validation error before any directory call when the email is
/// empty or malformed, otherwise the backend's failure detail.
#[instrument(skip(directory))]
pub async fn request_reset(directory: &dyn AccountDirectory, email: &str) -> Result<(), ResetError> {
    if email.trim().is_empty() {
        return Err(ValidationError::MissingField(Field::Email).into());
    }
    if !valid_email(email) {
        return Err(ValidationError::InvalidEmail.into());
    }

    match directory.send_password_reset(email).await {
        Ok(()) => {
            info!("Password reset requested");
            Ok(())
        }
        Err(e) => {
            error!("Reset Error: {}", e);
            Err(ResetError::Backend(e.detail().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::{MemoryDirectory, Operation};

    #[tokio::test]
    async fn sends_reset_for_valid_email() {
        let directory = MemoryDirectory::new();
        assert_eq!(request_reset(&directory, "ada@example.com").await, Ok(()));
        assert_eq!(directory.password_resets(), vec!["ada@example.com".to_string()]);
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_locally() {
        let directory = MemoryDirectory::new();
        assert_eq!(
            request_reset(&directory, "ada-at-example").await,
            Err(ResetError::Validation(ValidationError::InvalidEmail))
        );
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn backend_detail_is_surfaced() {
        let directory = MemoryDirectory::new();
        directory.fail(Operation::SendPasswordReset);

        let result = request_reset(&directory, "ada@example.com").await;
        assert_eq!(
            result.map_err(|e| e.user_message()),
            Err("Failed to send reset email: EMAIL_NOT_FOUND".to_string())
        );
    }
}
