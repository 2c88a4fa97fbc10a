//! Multi-step operations triggered by one user action.
//!
//! Steps run strictly in sequence, each awaiting the previous one. Nothing
//! here retries; a failure ends the run and the user resubmits.

pub mod reset;
pub mod signin;
pub mod signup;

pub use reset::{request_reset, ResetError};
pub use signin::{sign_in, SignedIn, SigninError, SigninForm};
pub use signup::{register, ReferralCredit, Registration, SignupError, SignupForm};

pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;
pub const DEFAULT_DASHBOARD_URL: &str = "dashboard.html";

/// Settings shared by the workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Signup password minimum, in characters.
    pub min_password_length: usize,
    /// Where a successful signup or signin ends up.
    pub dashboard_url: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
        }
    }
}
