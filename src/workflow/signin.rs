//! Sign in: `Validating -> Authenticating -> PersistingPreference -> Done`.
//!
//! Unknown email and wrong password produce the same error so the response
//! does not reveal which one was wrong. Only throttling is reported apart.

use crate::{
    directory::{AccountDirectory, VerifyError},
    preferences::{self, PreferenceStore},
    validator::{validate_signin, ValidationError},
};
use secrecy::SecretString;
use std::fmt;
use tracing::{debug, error, instrument};

pub struct SigninForm {
    pub email: String,
    pub password: SecretString,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigninState {
    Validating,
    Authenticating,
    PersistingPreference,
    Done,
}

impl fmt::Display for SigninState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigninError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("wrong credentials")]
    WrongCredentials,
    #[error("too many attempts")]
    TooManyAttempts,
}

impl SigninError {
    /// Text shown to the user in an alert.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.user_message(),
            Self::WrongCredentials => "Invalid email or password.".to_string(),
            Self::TooManyAttempts => "Access to this account has been temporarily disabled due to many failed login attempts.".to_string(),
        }
    }
}

fn enter(state: SigninState) {
    debug!("signin: {}", state);
}

/// Run the sign-in workflow.
///
/// On success the email is remembered when `remember_me` is set, and any
/// previously remembered email is cleared otherwise. Failures leave the
/// preference store untouched.
///
/// # Errors
///
/// Returns the reason the run was aborted.
#[instrument(skip(directory, store, form))]
pub async fn sign_in(
    directory: &dyn AccountDirectory,
    store: &mut dyn PreferenceStore,
    form: &SigninForm,
) -> Result<SignedIn, SigninError> {
    enter(SigninState::Validating);
    validate_signin(&form.email, &form.password)?;

    enter(SigninState::Authenticating);
    let identity = directory
        .verify_credential(&form.email, &form.password)
        .await
        .map_err(|e| match e {
            VerifyError::TooManyAttempts => SigninError::TooManyAttempts,
            VerifyError::NotFound | VerifyError::WrongPassword => {
                debug!("Login rejected: {}", e);
                SigninError::WrongCredentials
            }
            VerifyError::Other(detail) => {
                error!("Login Error: {}", detail);
                SigninError::WrongCredentials
            }
        })?;

    enter(SigninState::PersistingPreference);
    preferences::remember_email(store, form.remember_me.then_some(form.email.as_str()));

    enter(SigninState::Done);

    Ok(SignedIn {
        uid: identity.uid,
        email: form.email.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        directory::memory::{MemoryDirectory, Operation},
        preferences::{MemoryPreferences, REMEMBERED_EMAIL_KEY},
    };

    fn form(email: &str, password: &str, remember_me: bool) -> SigninForm {
        SigninForm {
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
            remember_me,
        }
    }

    async fn directory_with(email: &str, password: &str) -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        let created = directory
            .create_credential(email, &SecretString::from(password.to_string()))
            .await;
        assert!(created.is_ok());
        directory
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let directory = directory_with("ada@example.com", "engine42").await;
        let mut prefs = MemoryPreferences::default();

        let unknown = sign_in(&directory, &mut prefs, &form("eve@example.com", "engine42", false)).await;
        let wrong = sign_in(&directory, &mut prefs, &form("ada@example.com", "engine43", false)).await;

        assert_eq!(unknown, Err(SigninError::WrongCredentials));
        assert_eq!(wrong, Err(SigninError::WrongCredentials));
    }

    #[tokio::test]
    async fn backend_failure_collapses_to_generic_message() {
        let directory = directory_with("ada@example.com", "engine42").await;
        directory.fail(Operation::VerifyCredential);
        let mut prefs = MemoryPreferences::default();

        let result = sign_in(&directory, &mut prefs, &form("ada@example.com", "engine42", true)).await;
        assert_eq!(
            result.map_err(|e| e.user_message()),
            Err("Invalid email or password.".to_string())
        );
        assert_eq!(prefs.get(REMEMBERED_EMAIL_KEY), None);
    }

    #[tokio::test]
    async fn throttling_is_reported() {
        let directory = directory_with("ada@example.com", "engine42").await;
        directory.throttle("ada@example.com");
        let mut prefs = MemoryPreferences::default();

        let result = sign_in(&directory, &mut prefs, &form("ada@example.com", "engine42", false)).await;
        assert_eq!(result, Err(SigninError::TooManyAttempts));
    }

    #[tokio::test]
    async fn failed_signin_keeps_previous_preference() {
        let directory = directory_with("ada@example.com", "engine42").await;
        let mut prefs = MemoryPreferences::default();
        prefs.set(REMEMBERED_EMAIL_KEY, "ada@example.com");

        let result = sign_in(&directory, &mut prefs, &form("ada@example.com", "nope", false)).await;
        assert!(result.is_err());
        assert_eq!(
            prefs.get(REMEMBERED_EMAIL_KEY),
            Some("ada@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn invalid_email_never_reaches_directory() {
        let directory = MemoryDirectory::new();
        let mut prefs = MemoryPreferences::default();

        let result = sign_in(&directory, &mut prefs, &form("ada", "engine42", false)).await;
        assert_eq!(
            result,
            Err(SigninError::Validation(ValidationError::InvalidEmail))
        );
        assert!(directory.calls().is_empty());
    }
}
