//! The sign-in page: what it shows on load and how its forms are submitted.

use crate::{
    directory::DirectoryConnector,
    preferences::{self, PreferenceStore},
    present::{present, Control, Outcome, Presenter},
    workflow::{self, SigninForm, SignupForm, WorkflowConfig},
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tracing::debug;
use url::form_urlencoded;
use utoipa::ToSchema;

/// Query parameter carrying the referrer's username.
pub const REFERRAL_PARAM: &str = "ref";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Signin,
    Signup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReferralField {
    pub value: String,
    /// Set when the value came from the link; the field is then read-only.
    pub locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageState {
    pub view: View,
    pub referred_by: ReferralField,
    pub signin_email: String,
    pub remember_me: bool,
    pub dark_mode: bool,
}

impl PageState {
    /// Initial state from the URL query string (without `?`) and the stored
    /// preferences.
    #[must_use]
    pub fn load(query: Option<&str>, store: &dyn PreferenceStore) -> Self {
        let mut state = Self {
            dark_mode: preferences::dark_mode(store),
            ..Self::default()
        };

        if let Some(email) = preferences::remembered_email(store) {
            state.signin_email = email;
            state.remember_me = true;
        }

        if let Some(referrer) = query.and_then(referral_code) {
            state.referred_by = ReferralField {
                value: referrer,
                locked: true,
            };
            state.view = View::Signup;
        }

        state
    }
}

/// First non-empty `ref` parameter.
fn referral_code(query: &str) -> Option<String> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, value)| key == REFERRAL_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Result of a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Dropped: the same form was still in flight, or there was nothing to send.
    Ignored,
    Completed(Outcome),
}

#[derive(Default)]
struct InFlight {
    signup: AtomicBool,
    signin: AtomicBool,
    forgot_password: AtomicBool,
}

impl InFlight {
    fn flag(&self, control: Control) -> &AtomicBool {
        match control {
            Control::Signup => &self.signup,
            Control::Signin => &self.signin,
            Control::ForgotPassword => &self.forgot_password,
        }
    }
}

/// Marks a control busy until dropped.
struct Busy<'a> {
    flag: &'a AtomicBool,
    control: Control,
    presenter: &'a dyn Presenter,
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.presenter.set_busy(self.control, false);
        self.flag.store(false, Ordering::Release);
    }
}

/// One loaded page, bound to a presenter. Every submit runs on its own
/// directory session.
pub struct AuthPage {
    connector: Arc<dyn DirectoryConnector>,
    config: WorkflowConfig,
    presenter: Arc<dyn Presenter>,
    store: tokio::sync::Mutex<Box<dyn PreferenceStore>>,
    state: Mutex<PageState>,
    in_flight: InFlight,
}

impl AuthPage {
    pub fn load(
        connector: Arc<dyn DirectoryConnector>,
        config: WorkflowConfig,
        presenter: Arc<dyn Presenter>,
        store: Box<dyn PreferenceStore>,
        query: Option<&str>,
    ) -> Self {
        let state = PageState::load(query, store.as_ref());
        Self {
            connector,
            config,
            presenter,
            store: tokio::sync::Mutex::new(store),
            state: Mutex::new(state),
            in_flight: InFlight::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> PageState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    pub fn show(&self, view: View) {
        if let Ok(mut state) = self.state.lock() {
            state.view = view;
        }
    }

    /// Flip dark mode and persist it; returns the new setting.
    pub async fn toggle_dark_mode(&self) -> bool {
        let enabled = !self.state().dark_mode;
        preferences::set_dark_mode(self.store.lock().await.as_mut(), enabled);
        if let Ok(mut state) = self.state.lock() {
            state.dark_mode = enabled;
        }
        enabled
    }

    fn begin(&self, control: Control) -> Option<Busy<'_>> {
        let flag = self.in_flight.flag(control);
        if flag.swap(true, Ordering::AcqRel) {
            debug!("{:?} already in flight, ignoring submit", control);
            return None;
        }
        self.presenter.set_busy(control, true);
        Some(Busy {
            flag,
            control,
            presenter: self.presenter.as_ref(),
        })
    }

    /// Submit the signup form. A referrer locked by the page link wins over
    /// whatever the form carries.
    pub async fn submit_signup(&self, mut form: SignupForm) -> Submission {
        let Some(busy) = self.begin(Control::Signup) else {
            return Submission::Ignored;
        };

        let referral = self.state().referred_by;
        if referral.locked {
            form.referred_by = referral.value;
        }

        let directory = self.connector.connect();
        let result = workflow::register(directory.as_ref(), &form, &self.config).await;
        let outcome = Outcome::signup(&result, &self.config);

        drop(busy);
        present(self.presenter.as_ref(), &outcome).await;
        Submission::Completed(outcome)
    }

    pub async fn submit_signin(&self, form: SigninForm) -> Submission {
        let Some(busy) = self.begin(Control::Signin) else {
            return Submission::Ignored;
        };

        let result = {
            let directory = self.connector.connect();
            let mut store = self.store.lock().await;
            workflow::sign_in(directory.as_ref(), store.as_mut(), &form).await
        };
        if result.is_ok() {
            if let Ok(mut state) = self.state.lock() {
                state.remember_me = form.remember_me;
                state.signin_email = if form.remember_me {
                    form.email.clone()
                } else {
                    String::new()
                };
            }
        }
        let outcome = Outcome::signin(&result, &self.config);

        drop(busy);
        present(self.presenter.as_ref(), &outcome).await;
        Submission::Completed(outcome)
    }

    /// `email` is what the user typed into the reset prompt; `None` or empty
    /// means the prompt was dismissed.
    pub async fn forgot_password(&self, email: Option<String>) -> Submission {
        let Some(email) = email.filter(|email| !email.is_empty()) else {
            return Submission::Ignored;
        };
        let Some(busy) = self.begin(Control::ForgotPassword) else {
            return Submission::Ignored;
        };

        let directory = self.connector.connect();
        let result = workflow::request_reset(directory.as_ref(), &email).await;
        let outcome = Outcome::reset(&result, &email);

        drop(busy);
        present(self.presenter.as_ref(), &outcome).await;
        Submission::Completed(outcome)
    }
}
