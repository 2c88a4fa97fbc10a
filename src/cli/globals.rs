use crate::directory::firebase::FirebaseConfig;
use secrecy::SecretString;
use std::time::Duration;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_key: SecretString,
    pub project_id: String,
    pub auth_url: String,
    pub firestore_url: String,
    pub timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(project_id: String) -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            project_id,
            auth_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            firestore_url: "https://firestore.googleapis.com/v1".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn set_api_key(&mut self, api_key: SecretString) {
        self.api_key = api_key;
    }

    #[must_use]
    pub fn firebase_config(&self) -> FirebaseConfig {
        FirebaseConfig {
            api_key: self.api_key.clone(),
            project_id: self.project_id.clone(),
            auth_url: self.auth_url.clone(),
            firestore_url: self.firestore_url.clone(),
            timeout: self.timeout,
        }
    }
}
