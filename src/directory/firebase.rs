//! Hosted backend over REST.
//!
//! Credentials go through the Identity Toolkit `accounts:*` endpoints, records
//! through the Firestore documents API. A [`FirebaseClient`] is shared by the
//! whole process; each workflow run gets its own [`FirebaseSession`], which
//! remembers the id token of the identity it created or verified and sends it
//! as a bearer token on record calls.

use super::{
    Account, AccountDirectory, Amount, CredentialError, DirectoryConnector, DirectoryError,
    Identity, NewAccount, Role, VerifyError,
};
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use std::{
    sync::{Arc, RwLock},
    time::Duration,
};
use tracing::{debug, error, instrument};

pub const USERS_COLLECTION: &str = "users";
pub const SETTINGS_DOCUMENT: &str = "settings/general";

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: SecretString,
    pub project_id: String,
    pub auth_url: String,
    pub firestore_url: String,
    pub timeout: Duration,
}

/// Shared HTTP client and connection settings.
#[derive(Clone)]
pub struct FirebaseClient {
    client: Client,
    config: Arc<FirebaseConfig>,
}

impl FirebaseClient {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: FirebaseConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn session(&self) -> FirebaseSession {
        FirebaseSession {
            client: self.clone(),
            id_token: RwLock::new(None),
        }
    }

    fn auth_endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{method}",
            self.config.auth_url.trim_end_matches('/')
        )
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.firestore_url.trim_end_matches('/'),
            self.database_path()
        )
    }

    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.config.project_id
        )
    }

    /// Full resource name of a document, as used inside commit bodies.
    fn document_name(&self, path: &str) -> String {
        format!("{}/{path}", self.database_path())
    }
}

impl DirectoryConnector for FirebaseClient {
    fn connect(&self) -> Arc<dyn AccountDirectory> {
        Arc::new(self.session())
    }

    fn kind(&self) -> &'static str {
        "firebase"
    }
}

/// Identity Toolkit failure: the error code and the full message.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AuthFailure {
    code: String,
    message: String,
}

impl AuthFailure {
    fn transport(err: &reqwest::Error) -> Self {
        Self {
            code: "NETWORK_REQUEST_FAILED".to_string(),
            message: err.to_string(),
        }
    }

    /// `{"error": {"message": "WEAK_PASSWORD : Password should be ..."}}`
    fn from_body(status: StatusCode, body: &Value) -> Self {
        let message = body["error"]["message"]
            .as_str()
            .map_or_else(|| status.to_string(), str::to_string);
        let code = message
            .split(" : ")
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Self { code, message }
    }

    /// Readable text for the codes users actually hit.
    fn describe(&self) -> String {
        match self.code.as_str() {
            "EMAIL_NOT_FOUND" => {
                "There is no user record corresponding to this identifier.".to_string()
            }
            "INVALID_EMAIL" => "The email address is badly formatted.".to_string(),
            "OPERATION_NOT_ALLOWED" => {
                "This operation is not allowed for this project.".to_string()
            }
            _ => self
                .message
                .split_once(" : ")
                .map_or_else(|| self.message.clone(), |(_, detail)| detail.to_string()),
        }
    }
}

fn credential_error(failure: &AuthFailure) -> CredentialError {
    match failure.code.as_str() {
        "EMAIL_EXISTS" => CredentialError::EmailAlreadyInUse,
        "WEAK_PASSWORD" => CredentialError::WeakPassword(failure.describe()),
        _ => CredentialError::Other(failure.describe()),
    }
}

fn verify_error(failure: &AuthFailure) -> VerifyError {
    match failure.code.as_str() {
        "EMAIL_NOT_FOUND" | "USER_DISABLED" => VerifyError::NotFound,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => VerifyError::WrongPassword,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => VerifyError::TooManyAttempts,
        _ => VerifyError::Other(failure.describe()),
    }
}

fn identity_from(body: &Value) -> Option<Identity> {
    Some(Identity {
        uid: body["localId"].as_str()?.to_string(),
        email: body["email"].as_str().unwrap_or_default().to_string(),
        id_token: SecretString::from(body["idToken"].as_str()?.to_string()),
    })
}

/// Firestore error bodies carry `{"error": {"message": ...}}` as well.
fn firestore_detail(status: StatusCode, body: &Value) -> String {
    body["error"]["message"]
        .as_str()
        .map_or_else(|| status.to_string(), str::to_string)
}

/// Convert a typed Firestore value into plain JSON.
fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map_or_else(|| inner.clone(), Value::from),
        "mapValue" => Value::Object(decode_fields(&inner["fields"])),
        "arrayValue" => Value::Array(
            inner["values"]
                .as_array()
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "nullValue" => Value::Null,
        // stringValue, doubleValue, booleanValue, timestampValue, referenceValue
        _ => inner.clone(),
    }
}

fn decode_fields(fields: &Value) -> Map<String, Value> {
    fields
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(name, value)| (name.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

fn amount_value(amount: Amount) -> Value {
    match amount.as_integer() {
        Some(whole) => json!({ "integerValue": whole.to_string() }),
        None => json!({ "doubleValue": amount.value() }),
    }
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn account_from_document(document: &Value) -> Option<Account> {
    let fields = decode_fields(&document["fields"]);
    let uid = fields
        .get("uid")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            document["name"]
                .as_str()
                .and_then(|name| name.rsplit('/').next())
                .map(str::to_string)
        })?;
    let text = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let amount = |name: &str| fields.get(name).and_then(Amount::from_json).unwrap_or_default();

    Some(Account {
        uid,
        full_name: text("fullname"),
        username: text("username"),
        email: text("email"),
        balance: amount("balance"),
        referral_earnings: amount("referralEarnings"),
        referrals_count: fields
            .get("referralsCount")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        referred_by: fields
            .get("referredBy")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        role: Role::parse(&text("role")),
        created_at: fields
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

fn username_query(username: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": USERS_COLLECTION }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "username" },
                    "op": "EQUAL",
                    "value": string_value(username),
                }
            },
            "limit": 1
        }
    })
}

fn profile_write(name: &str, account: &NewAccount) -> Value {
    let referred_by = account
        .referred_by
        .as_deref()
        .map_or_else(|| json!({ "nullValue": null }), string_value);
    json!({
        "writes": [{
            "update": {
                "name": name,
                "fields": {
                    "uid": string_value(&account.uid),
                    "fullname": string_value(&account.full_name),
                    "username": string_value(&account.username),
                    "email": string_value(&account.email),
                    "referredBy": referred_by,
                    "balance": amount_value(Amount::ZERO),
                    "referralEarnings": amount_value(Amount::ZERO),
                    "referralsCount": { "integerValue": "0" },
                    "role": string_value(account.role.as_str()),
                }
            },
            "updateTransforms": [
                { "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" }
            ]
        }]
    })
}

fn referral_increment(name: &str, amount: Amount) -> Value {
    json!({
        "writes": [{
            "transform": {
                "document": name,
                "fieldTransforms": [
                    { "fieldPath": "balance", "increment": amount_value(amount) },
                    { "fieldPath": "referralEarnings", "increment": amount_value(amount) },
                    { "fieldPath": "referralsCount", "increment": { "integerValue": "1" } },
                ]
            },
            "currentDocument": { "exists": true }
        }]
    })
}

/// One workflow run against the hosted backend.
pub struct FirebaseSession {
    client: FirebaseClient,
    id_token: RwLock<Option<SecretString>>,
}

impl FirebaseSession {
    fn remember(&self, identity: &Identity) {
        if let Ok(mut slot) = self.id_token.write() {
            *slot = Some(identity.id_token.clone());
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .id_token
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(|t| t.expose_secret().to_string()));
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_auth(&self, method: &str, payload: &Value) -> Result<Value, AuthFailure> {
        let url = self.client.auth_endpoint(method);
        let response = self
            .client
            .client
            .post(&url)
            .query(&[("key", self.client.config.api_key.expose_secret())])
            .json(payload)
            .send()
            .await
            .map_err(|e| AuthFailure::transport(&e))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let failure = AuthFailure::from_body(status, &body);
            debug!("accounts:{} - {}, {}", method, status, failure.code);
            return Err(failure);
        }

        Ok(body)
    }

    /// POST `{documents}:commit` with the given body.
    async fn commit(&self, body: &Value) -> Result<(), DirectoryError> {
        let url = format!("{}:commit", self.client.documents_url());
        let response = self
            .authorize(self.client.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| DirectoryError::Write(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let detail = firestore_detail(status, &body);
            error!("{} - {}, {}", url, status, detail);
            return Err(DirectoryError::Write(detail));
        }

        Ok(())
    }
}

#[async_trait]
impl AccountDirectory for FirebaseSession {
    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, DirectoryError> {
        let url = format!("{}:runQuery", self.client.documents_url());
        let response = self
            .authorize(self.client.client.post(&url))
            .json(&username_query(username))
            .send()
            .await
            .map_err(|e| DirectoryError::Read(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(DirectoryError::Read(firestore_detail(status, &body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DirectoryError::Read(e.to_string()))?;

        // An empty result is a single element carrying only `readTime`.
        Ok(body
            .as_array()
            .and_then(|results| results.iter().find_map(|r| r.get("document")))
            .and_then(account_from_document))
    }

    #[instrument(skip(self, password))]
    async fn create_credential(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, CredentialError> {
        let payload = json!({
            "email": email,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let body = self
            .post_auth("signUp", &payload)
            .await
            .map_err(|failure| credential_error(&failure))?;
        let identity = identity_from(&body).ok_or_else(|| {
            CredentialError::Other("Error parsing JSON response: no localId found".to_string())
        })?;
        self.remember(&identity);
        Ok(identity)
    }

    #[instrument(skip(self, account), fields(uid = %account.uid))]
    async fn create_account_record(&self, account: &NewAccount) -> Result<(), DirectoryError> {
        let name = self
            .client
            .document_name(&format!("{USERS_COLLECTION}/{}", account.uid));
        self.commit(&profile_write(&name, account)).await
    }

    #[instrument(skip(self))]
    async fn increment_balance_and_referral_count(
        &self,
        account_id: &str,
        amount: Amount,
    ) -> Result<(), DirectoryError> {
        let name = self
            .client
            .document_name(&format!("{USERS_COLLECTION}/{account_id}"));
        self.commit(&referral_increment(&name, amount)).await
    }

    #[instrument(skip(self))]
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, DirectoryError> {
        let url = format!("{}/{SETTINGS_DOCUMENT}", self.client.documents_url());
        let response = self
            .authorize(self.client.client.get(&url))
            .send()
            .await
            .map_err(|e| DirectoryError::Read(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DirectoryError::Read(e.to_string()))?;

        if !status.is_success() {
            return Err(DirectoryError::Read(firestore_detail(status, &body)));
        }

        Ok(decode_fields(&body["fields"]).remove(key))
    }

    #[instrument(skip(self, password))]
    async fn verify_credential(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, VerifyError> {
        let payload = json!({
            "email": email,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let body = self
            .post_auth("signInWithPassword", &payload)
            .await
            .map_err(|failure| verify_error(&failure))?;
        let identity = identity_from(&body).ok_or_else(|| {
            VerifyError::Other("Error parsing JSON response: no localId found".to_string())
        })?;
        self.remember(&identity);
        Ok(identity)
    }

    #[instrument(skip(self))]
    async fn send_password_reset(&self, email: &str) -> Result<(), DirectoryError> {
        let payload = json!({
            "requestType": "PASSWORD_RESET",
            "email": email,
        });
        self.post_auth("sendOobCode", &payload)
            .await
            .map(|_| ())
            .map_err(|failure| DirectoryError::Other(failure.describe()))
    }
}
