//! What the page shows once a workflow ends.
//!
//! Every workflow result becomes one [`Outcome`]: a notice the user has to
//! dismiss (optionally followed by a redirect), an alert, or an immediate
//! navigation. A [`Presenter`] renders outcomes; notices hand back an
//! [`Acknowledgement`] that resolves once when the user dismisses them.

use crate::workflow::{
    Registration, ResetError, SignedIn, SigninError, SignupError, WorkflowConfig,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notice {
    pub title: String,
    pub message: String,
    /// Followed only after the user dismisses the notice.
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Notice { notice: Notice },
    Alert { message: String },
    Navigate { target: String },
}

impl Outcome {
    pub fn alert(message: impl Into<String>) -> Self {
        Self::Alert {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn signup(result: &Result<Registration, SignupError>, config: &WorkflowConfig) -> Self {
        match result {
            Ok(_) => Self::Notice {
                notice: Notice {
                    title: "Account Created!".to_string(),
                    message: "Your account has been successfully created.".to_string(),
                    redirect: Some(config.dashboard_url.clone()),
                },
            },
            Err(err) => Self::alert(err.user_message()),
        }
    }

    #[must_use]
    pub fn signin(result: &Result<SignedIn, SigninError>, config: &WorkflowConfig) -> Self {
        match result {
            Ok(_) => Self::Navigate {
                target: config.dashboard_url.clone(),
            },
            Err(err) => Self::alert(err.user_message()),
        }
    }

    #[must_use]
    pub fn reset(result: &Result<(), ResetError>, email: &str) -> Self {
        match result {
            Ok(()) => Self::Notice {
                notice: Notice {
                    title: "Password Reset".to_string(),
                    message: format!(
                        "A password reset link has been sent to {email}. Please check your inbox."
                    ),
                    redirect: None,
                },
            },
            Err(err) => Self::alert(err.user_message()),
        }
    }
}

/// Submit controls that show a busy state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Signup,
    Signin,
    ForgotPassword,
}

/// Resolves once, when the notice it belongs to is dismissed.
pub struct Acknowledgement(oneshot::Receiver<()>);

/// Held by the presenter; consuming it acknowledges the notice.
pub struct Dismissal(oneshot::Sender<()>);

impl Acknowledgement {
    #[must_use]
    pub fn channel() -> (Dismissal, Self) {
        let (tx, rx) = oneshot::channel();
        (Dismissal(tx), Self(rx))
    }

    /// `false` when the presenter dropped the notice without acknowledging.
    pub async fn acknowledged(self) -> bool {
        self.0.await.is_ok()
    }
}

impl Dismissal {
    pub fn acknowledge(self) {
        // The page may have gone away; nothing to tell it then.
        let _ = self.0.send(());
    }
}

/// Renders outcomes and busy states.
pub trait Presenter: Send + Sync {
    fn set_busy(&self, control: Control, busy: bool);
    fn alert(&self, message: &str);
    fn notice(&self, notice: &Notice) -> Acknowledgement;
    fn navigate(&self, target: &str);
}

/// Show `outcome`; a notice's redirect waits for its acknowledgement.
pub async fn present(presenter: &dyn Presenter, outcome: &Outcome) {
    match outcome {
        Outcome::Alert { message } => presenter.alert(message),
        Outcome::Navigate { target } => presenter.navigate(target),
        Outcome::Notice { notice } => {
            let acknowledgement = presenter.notice(notice);
            if let Some(target) = &notice.redirect {
                if acknowledgement.acknowledged().await {
                    presenter.navigate(target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        validator::ValidationError,
        workflow::ReferralCredit,
    };
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        navigations: Mutex<Vec<String>>,
        dismissals: Mutex<Vec<Dismissal>>,
        drop_notices: bool,
    }

    impl Presenter for Recorder {
        fn set_busy(&self, _control: Control, _busy: bool) {}

        fn alert(&self, _message: &str) {}

        fn notice(&self, _notice: &Notice) -> Acknowledgement {
            let (dismissal, acknowledgement) = Acknowledgement::channel();
            if self.drop_notices {
                return acknowledgement;
            }
            if let Ok(mut dismissals) = self.dismissals.lock() {
                dismissals.push(dismissal);
            }
            acknowledgement
        }

        fn navigate(&self, target: &str) {
            if let Ok(mut navigations) = self.navigations.lock() {
                navigations.push(target.to_string());
            }
        }
    }

    fn registration() -> Registration {
        Registration {
            uid: "u1".to_string(),
            username: "bob".to_string(),
            referral: ReferralCredit::NotReferred,
        }
    }

    #[test]
    fn signup_success_is_a_notice_with_redirect() {
        let outcome = Outcome::signup(&Ok(registration()), &WorkflowConfig::default());
        assert_eq!(
            serde_json::to_value(&outcome).ok(),
            Some(json!({
                "kind": "notice",
                "notice": {
                    "title": "Account Created!",
                    "message": "Your account has been successfully created.",
                    "redirect": "dashboard.html"
                }
            }))
        );
    }

    #[test]
    fn failures_are_alerts() {
        let outcome = Outcome::signup(
            &Err(SignupError::Validation(ValidationError::PasswordMismatch)),
            &WorkflowConfig::default(),
        );
        assert_eq!(outcome, Outcome::alert("Passwords do not match"));

        let outcome = Outcome::signin(&Err(SigninError::WrongCredentials), &WorkflowConfig::default());
        assert_eq!(outcome, Outcome::alert("Invalid email or password."));
    }

    #[test]
    fn reset_notice_names_the_email_and_stays() {
        let outcome = Outcome::reset(&Ok(()), "ada@example.com");
        let Outcome::Notice { notice } = outcome else {
            panic!("expected a notice");
        };
        assert_eq!(
            notice.message,
            "A password reset link has been sent to ada@example.com. Please check your inbox."
        );
        assert_eq!(notice.redirect, None);
    }

    #[tokio::test]
    async fn redirect_waits_for_acknowledgement() {
        let recorder = std::sync::Arc::new(Recorder::default());
        let outcome = Outcome::signup(&Ok(registration()), &WorkflowConfig::default());

        let task = {
            let recorder = recorder.clone();
            tokio::spawn(async move { present(recorder.as_ref(), &outcome).await })
        };

        // wait until the notice is up
        let dismissal = loop {
            let next = recorder.dismissals.lock().ok().and_then(|mut d| d.pop());
            if let Some(dismissal) = next {
                break dismissal;
            }
            tokio::task::yield_now().await;
        };
        assert!(recorder
            .navigations
            .lock()
            .map(|n| n.is_empty())
            .unwrap_or(false));

        dismissal.acknowledge();
        assert!(task.await.is_ok());
        assert_eq!(
            recorder.navigations.lock().map(|n| n.clone()).unwrap_or_default(),
            vec!["dashboard.html".to_string()]
        );
    }

    #[tokio::test]
    async fn dropped_notice_does_not_redirect() {
        let recorder = Recorder {
            drop_notices: true,
            ..Recorder::default()
        };
        let outcome = Outcome::signup(&Ok(registration()), &WorkflowConfig::default());

        present(&recorder, &outcome).await;

        assert!(recorder
            .navigations
            .lock()
            .map(|n| n.is_empty())
            .unwrap_or(false));
    }
}
