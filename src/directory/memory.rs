//! In-process directory.
//!
//! Keeps credentials, accounts and settings behind one mutex, so the referral
//! increment is atomic per account. Every call is recorded, and any operation
//! can be told to fail, which is what the workflow tests lean on.

use super::{
    Account, AccountDirectory, Amount, CredentialError, DirectoryConnector, DirectoryError,
    Identity, NewAccount, VerifyError,
};
use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::debug;
use uuid::Uuid;

/// Directory operations, used to inject failures and inspect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindByUsername,
    CreateCredential,
    CreateAccountRecord,
    IncrementBalanceAndReferralCount,
    GetSetting,
    VerifyCredential,
    SendPasswordReset,
}

/// One recorded call and its main argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub argument: String,
}

struct Credential {
    uid: String,
    password: SecretString,
}

#[derive(Default)]
struct State {
    credentials: HashMap<String, Credential>,
    accounts: HashMap<String, Account>,
    settings: HashMap<String, Value>,
    failing: HashSet<Operation>,
    throttled: HashSet<String>,
    resets: Vec<String>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Store a global setting.
    pub fn set_setting(&self, key: &str, value: Value) {
        self.lock().settings.insert(key.to_string(), value);
    }

    /// Make every subsequent call to `operation` fail.
    pub fn fail(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    /// Report too many attempts for this email on sign in.
    pub fn throttle(&self, email: &str) {
        self.lock().throttled.insert(email.to_string());
    }

    /// Insert a credential and its account directly.
    pub fn seed_account(&self, account: Account, password: &str) {
        let mut state = self.lock();
        state.credentials.insert(
            account.email.clone(),
            Credential {
                uid: account.uid.clone(),
                password: SecretString::from(password.to_string()),
            },
        );
        state.accounts.insert(account.uid.clone(), account);
    }

    #[must_use]
    pub fn account(&self, uid: &str) -> Option<Account> {
        self.lock().accounts.get(uid).cloned()
    }

    #[must_use]
    pub fn account_by_username(&self, username: &str) -> Option<Account> {
        self.lock()
            .accounts
            .values()
            .find(|account| account.username == username)
            .cloned()
    }

    #[must_use]
    pub fn has_credential(&self, email: &str) -> bool {
        self.lock().credentials.contains_key(email)
    }

    /// Emails a reset link was sent to, oldest first.
    #[must_use]
    pub fn password_resets(&self) -> Vec<String> {
        self.lock().resets.clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Record the call, then report whether it was told to fail.
    fn enter(state: &mut State, operation: Operation, argument: &str) -> bool {
        debug!("memory directory: {:?}({})", operation, argument);
        state.calls.push(Call {
            operation,
            argument: argument.to_string(),
        });
        state.failing.contains(&operation)
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, DirectoryError> {
        let mut state = self.lock();
        if Self::enter(&mut state, Operation::FindByUsername, username) {
            return Err(DirectoryError::Read("users query unavailable".to_string()));
        }
        Ok(state
            .accounts
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn create_credential(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, CredentialError> {
        let mut state = self.lock();
        if Self::enter(&mut state, Operation::CreateCredential, email) {
            return Err(CredentialError::Other(
                "credential service unavailable".to_string(),
            ));
        }
        if state.credentials.contains_key(email) {
            return Err(CredentialError::EmailAlreadyInUse);
        }
        // Same floor the hosted credential service applies.
        if password.expose_secret().chars().count() < 6 {
            return Err(CredentialError::WeakPassword(
                "Password should be at least 6 characters".to_string(),
            ));
        }

        let uid = Uuid::new_v4().simple().to_string();
        state.credentials.insert(
            email.to_string(),
            Credential {
                uid: uid.clone(),
                password: password.clone(),
            },
        );

        Ok(Identity {
            uid: uid.clone(),
            email: email.to_string(),
            id_token: SecretString::from(format!("memory-token-{uid}")),
        })
    }

    async fn create_account_record(&self, account: &NewAccount) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        if Self::enter(&mut state, Operation::CreateAccountRecord, &account.uid) {
            return Err(DirectoryError::Write(
                "Missing or insufficient permissions.".to_string(),
            ));
        }
        state.accounts.insert(
            account.uid.clone(),
            Account {
                uid: account.uid.clone(),
                full_name: account.full_name.clone(),
                username: account.username.clone(),
                email: account.email.clone(),
                balance: Amount::ZERO,
                referral_earnings: Amount::ZERO,
                referrals_count: 0,
                referred_by: account.referred_by.clone(),
                role: account.role,
                created_at: Some(Utc::now()),
            },
        );
        Ok(())
    }

    async fn increment_balance_and_referral_count(
        &self,
        account_id: &str,
        amount: Amount,
    ) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        if Self::enter(
            &mut state,
            Operation::IncrementBalanceAndReferralCount,
            account_id,
        ) {
            return Err(DirectoryError::Write("increment rejected".to_string()));
        }
        let account = state
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| DirectoryError::Write(format!("No document to update: {account_id}")))?;
        account.balance = account.balance + amount;
        account.referral_earnings = account.referral_earnings + amount;
        account.referrals_count += 1;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, DirectoryError> {
        let mut state = self.lock();
        if Self::enter(&mut state, Operation::GetSetting, key) {
            return Err(DirectoryError::Read("settings unavailable".to_string()));
        }
        Ok(state.settings.get(key).cloned())
    }

    async fn verify_credential(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, VerifyError> {
        let mut state = self.lock();
        if Self::enter(&mut state, Operation::VerifyCredential, email) {
            return Err(VerifyError::Other("credential service unavailable".to_string()));
        }
        if state.throttled.contains(email) {
            return Err(VerifyError::TooManyAttempts);
        }
        let credential = state.credentials.get(email).ok_or(VerifyError::NotFound)?;
        if credential.password.expose_secret() != password.expose_secret() {
            return Err(VerifyError::WrongPassword);
        }
        Ok(Identity {
            uid: credential.uid.clone(),
            email: email.to_string(),
            id_token: SecretString::from(format!("memory-token-{}", credential.uid)),
        })
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        if Self::enter(&mut state, Operation::SendPasswordReset, email) {
            return Err(DirectoryError::Other("EMAIL_NOT_FOUND".to_string()));
        }
        state.resets.push(email.to_string());
        Ok(())
    }
}

impl DirectoryConnector for MemoryDirectory {
    fn connect(&self) -> Arc<dyn AccountDirectory> {
        Arc::new(self.clone())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
