//! Referral-aware registration.
//!
//! `Validating -> CheckingUsername -> CreatingCredential ->
//! FetchingBonusSetting -> WritingProfile -> CreditingReferrer -> Done`
//!
//! Any step up to `WritingProfile` can abort the run. The bonus read and the
//! referrer credit cannot: their failures are logged and the registration
//! still succeeds.
//!
//! A profile-write failure leaves a credential without a profile behind.
//! Nothing compensates for it here; the orphaned uid is logged at `error`.

use crate::{
    directory::{AccountDirectory, Amount, CredentialError, DirectoryError, NewAccount, Role},
    validator::{validate_signup, SignupFields, ValidationError},
    workflow::WorkflowConfig,
};
use secrecy::SecretString;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

/// Setting holding the amount credited to a referrer.
pub const REFERRAL_BONUS_SETTING: &str = "referralBonus";

pub struct SignupForm {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    /// Username of the referring account; may be empty.
    pub referred_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupState {
    Validating,
    CheckingUsername,
    CreatingCredential,
    FetchingBonusSetting,
    WritingProfile,
    CreditingReferrer,
    Done,
}

impl fmt::Display for SignupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened to the referral reward.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferralCredit {
    NotReferred,
    /// Referred, but the bonus is zero or could not be read.
    NoBonus,
    ReferrerNotFound,
    Credited { referrer_uid: String, amount: Amount },
    /// Lookup or increment failed; the registration still stands.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub uid: String,
    pub username: String,
    pub referral: ReferralCredit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already in use")]
    EmailInUse,
    #[error("credential creation failed: {0}")]
    Credential(String),
    #[error("profile write failed for {uid}: {detail}")]
    ProfileWrite { uid: String, detail: String },
    #[error("username lookup failed: {0}")]
    Lookup(DirectoryError),
}

impl SignupError {
    /// Text shown to the user in an alert.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.user_message(),
            Self::UsernameTaken => {
                "This username is already taken. Please choose another one.".to_string()
            }
            Self::EmailInUse => "This email address is already in use.".to_string(),
            Self::Credential(detail) | Self::ProfileWrite { detail, .. } => detail.clone(),
            Self::Lookup(err) => err.detail().to_string(),
        }
    }
}

fn enter(state: SignupState) {
    debug!("signup: {}", state);
}

/// Run the registration workflow.
///
/// # Errors
///
/// Returns the reason the run was aborted. Validation errors are returned
/// before any directory call is made.
#[instrument(skip(directory, form, config), fields(username = %form.username.trim()))]
pub async fn register(
    directory: &dyn AccountDirectory,
    form: &SignupForm,
    config: &WorkflowConfig,
) -> Result<Registration, SignupError> {
    enter(SignupState::Validating);
    validate_signup(
        &SignupFields {
            full_name: &form.full_name,
            username: &form.username,
            email: &form.email,
            password: &form.password,
            confirm_password: &form.confirm_password,
        },
        config.min_password_length,
    )?;

    let username = form.username.trim();
    let referred_by = Some(form.referred_by.trim()).filter(|r| !r.is_empty());

    // The directory has no create-if-absent, so this narrows the race window
    // without closing it.
    enter(SignupState::CheckingUsername);
    match directory.find_by_username(username).await {
        Ok(Some(_)) => return Err(SignupError::UsernameTaken),
        Ok(None) => (),
        Err(e) => {
            error!("Error checking if username exists: {}", e);
            return Err(SignupError::Lookup(e));
        }
    }

    enter(SignupState::CreatingCredential);
    let identity = directory
        .create_credential(&form.email, &form.password)
        .await
        .map_err(|e| match e {
            CredentialError::EmailAlreadyInUse => SignupError::EmailInUse,
            CredentialError::WeakPassword(detail) | CredentialError::Other(detail) => {
                error!("Error creating credential: {}", detail);
                SignupError::Credential(detail)
            }
        })?;

    enter(SignupState::FetchingBonusSetting);
    let bonus = referral_bonus(directory).await;

    enter(SignupState::WritingProfile);
    let account = NewAccount {
        uid: identity.uid.clone(),
        full_name: form.full_name.clone(),
        username: username.to_string(),
        email: form.email.clone(),
        referred_by: referred_by.map(str::to_string),
        role: Role::User,
    };
    if let Err(e) = directory.create_account_record(&account).await {
        error!(
            "Error writing profile, credential {} has no profile: {}",
            identity.uid, e
        );
        return Err(SignupError::ProfileWrite {
            uid: identity.uid,
            detail: e.detail().to_string(),
        });
    }

    let referral = match referred_by {
        None => ReferralCredit::NotReferred,
        Some(_) if bonus.is_zero() => ReferralCredit::NoBonus,
        Some(referrer) => {
            enter(SignupState::CreditingReferrer);
            credit_referrer(directory, referrer, bonus).await
        }
    };

    enter(SignupState::Done);
    info!("Account {} created, referral: {:?}", identity.uid, referral);

    Ok(Registration {
        uid: identity.uid,
        username: username.to_string(),
        referral,
    })
}

/// Read the referral bonus; anything unreadable counts as zero.
async fn referral_bonus(directory: &dyn AccountDirectory) -> Amount {
    match directory.get_setting(REFERRAL_BONUS_SETTING).await {
        Ok(Some(value)) => Amount::from_json(&value).unwrap_or_else(|| {
            warn!("Ignoring invalid {} setting: {}", REFERRAL_BONUS_SETTING, value);
            Amount::ZERO
        }),
        Ok(None) => Amount::ZERO,
        Err(e) => {
            warn!("Could not fetch settings: {}", e);
            Amount::ZERO
        }
    }
}

async fn credit_referrer(
    directory: &dyn AccountDirectory,
    referrer: &str,
    bonus: Amount,
) -> ReferralCredit {
    let account = match directory.find_by_username(referrer).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            debug!("Referrer {} not found, skipping reward", referrer);
            return ReferralCredit::ReferrerNotFound;
        }
        Err(e) => {
            warn!("Error looking up referrer {}: {}", referrer, e);
            return ReferralCredit::Failed(e.to_string());
        }
    };

    match directory
        .increment_balance_and_referral_count(&account.uid, bonus)
        .await
    {
        Ok(()) => ReferralCredit::Credited {
            referrer_uid: account.uid,
            amount: bonus,
        },
        Err(e) => {
            warn!("Error crediting referrer {}: {}", account.uid, e);
            ReferralCredit::Failed(e.to_string())
        }
    }
}
