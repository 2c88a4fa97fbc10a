//! Port to the hosted user-record store and credential service.
//!
//! The [`AccountDirectory`] trait is the only way the workflows reach the
//! backend. Errors are closed enums so the workflows switch on variants
//! instead of matching backend error strings.

pub mod firebase;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// Non-negative, finite monetary amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Amount(f64);

impl Amount {
    pub const ZERO: Self = Self(0.0);

    /// Returns `None` for negative, NaN or infinite values.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value >= 0.0).then_some(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    /// Whole amounts fit the backend's integer counters.
    #[must_use]
    pub fn as_integer(self) -> Option<i64> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let whole = self.0 as i64;
        #[allow(clippy::cast_precision_loss)]
        let exact = whole as f64 == self.0;
        exact.then_some(whole)
    }

    /// Interpret a setting value; strings holding numbers are accepted.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().and_then(Self::new),
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(Self::new),
            _ => None,
        }
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl TryFrom<f64> for Amount {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("invalid amount: {value}"))
    }
}

impl From<Amount> for f64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_integer() {
            Some(whole) => write!(f, "{whole}"),
            None => write!(f, "{}", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Unknown roles fall back to `user`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

/// Stored user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub balance: Amount,
    pub referral_earnings: Amount,
    pub referrals_count: u64,
    pub referred_by: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

/// Record written once at signup. Counters start at zero and the creation
/// timestamp is assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub uid: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub referred_by: Option<String>,
    pub role: Role,
}

/// Authenticated principal returned by the credential service.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub id_token: SecretString,
}

/// Record store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("read failed: {0}")]
    Read(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("{0}")]
    Other(String),
}

impl DirectoryError {
    /// Backend detail without the operation prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Read(detail) | Self::Write(detail) | Self::Other(detail) => detail,
        }
    }
}

/// `create_credential` failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("weak password: {0}")]
    WeakPassword(String),
    #[error("{0}")]
    Other(String),
}

/// `verify_credential` failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("account not found")]
    NotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("{0}")]
    Other(String),
}

/// Operations the workflows need from the backend.
///
/// Calls made after `create_credential` or `verify_credential` run as that
/// identity. Implementations do not retry.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Zero or one account with exactly this username.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, DirectoryError>;

    async fn create_credential(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, CredentialError>;

    async fn create_account_record(&self, account: &NewAccount) -> Result<(), DirectoryError>;

    /// Add `amount` to balance and referral earnings and one to the referral
    /// count, atomically with respect to other increments on the account.
    async fn increment_balance_and_referral_count(
        &self,
        account_id: &str,
        amount: Amount,
    ) -> Result<(), DirectoryError>;

    /// Global setting by key; `None` when unset.
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, DirectoryError>;

    async fn verify_credential(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, VerifyError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), DirectoryError>;
}

/// Hands out one directory session per workflow run.
pub trait DirectoryConnector: Send + Sync {
    fn connect(&self) -> Arc<dyn AccountDirectory>;

    /// Short label for health output and logs.
    fn kind(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_rejects_negative_and_non_finite() {
        assert!(Amount::new(-1.0).is_none());
        assert!(Amount::new(f64::NAN).is_none());
        assert!(Amount::new(f64::INFINITY).is_none());
        assert_eq!(Amount::new(0.0), Some(Amount::ZERO));
    }

    #[test]
    fn amount_from_json_accepts_numbers_and_numeric_strings() {
        assert_eq!(Amount::from_json(&json!(50)), Amount::new(50.0));
        assert_eq!(Amount::from_json(&json!(2.5)), Amount::new(2.5));
        assert_eq!(Amount::from_json(&json!("10")), Amount::new(10.0));
        assert_eq!(Amount::from_json(&json!(-3)), None);
        assert_eq!(Amount::from_json(&json!(null)), None);
        assert_eq!(Amount::from_json(&json!("ten")), None);
    }

    #[test]
    fn amount_integer_view() {
        assert_eq!(Amount::new(25.0).and_then(Amount::as_integer), Some(25));
        assert_eq!(Amount::new(2.5).and_then(Amount::as_integer), None);
        assert_eq!(Amount::new(2.5).map(|a| a.to_string()), Some("2.5".to_string()));
    }

    #[test]
    fn role_parse_defaults_to_user() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("owner"), Role::User);
        assert_eq!(Role::default().as_str(), "user");
    }
}
