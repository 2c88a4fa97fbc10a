//! Durable per-browser preferences: the remembered sign-in email and the
//! dark-mode flag.

use std::collections::HashMap;

/// Key of the remembered sign-in email.
pub const REMEMBERED_EMAIL_KEY: &str = "taskwave_user_email";
/// Key of the dark-mode flag, stored as `"true"` or `"false"`.
pub const DARK_MODE_KEY: &str = "darkMode";

/// String key/value store surviving page reloads.
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Remembered sign-in email; empty values count as absent.
pub fn remembered_email(store: &dyn PreferenceStore) -> Option<String> {
    store
        .get(REMEMBERED_EMAIL_KEY)
        .filter(|email| !email.is_empty())
}

/// Persist `email`, or clear the remembered email when `None`.
pub fn remember_email(store: &mut dyn PreferenceStore, email: Option<&str>) {
    match email {
        Some(email) => store.set(REMEMBERED_EMAIL_KEY, email),
        None => store.remove(REMEMBERED_EMAIL_KEY),
    }
}

pub fn dark_mode(store: &dyn PreferenceStore) -> bool {
    store.get(DARK_MODE_KEY).as_deref() == Some("true")
}

pub fn set_dark_mode(store: &mut dyn PreferenceStore, enabled: bool) {
    store.set(DARK_MODE_KEY, if enabled { "true" } else { "false" });
}
