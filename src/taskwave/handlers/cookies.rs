use crate::preferences::PreferenceStore;
use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use std::collections::HashMap;
use tracing::error;
use url::form_urlencoded;

/// One year, in seconds.
pub const PREFERENCE_MAX_AGE: u64 = 60 * 60 * 24 * 365;

/// Browser preferences carried in cookies.
///
/// Reads the request's `Cookie` headers; every `set`/`remove` is remembered
/// and turned into a `Set-Cookie` header for the response.
#[derive(Debug, Default)]
pub struct CookiePreferences {
    values: HashMap<String, String>,
    changes: Vec<(String, Option<String>)>,
}

impl CookiePreferences {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for pair in header.split(';') {
                if let Some((key, value)) = form_urlencoded::parse(pair.trim().as_bytes()).next() {
                    values.insert(key.into_owned(), value.into_owned());
                }
            }
        }
        Self {
            values,
            changes: Vec::new(),
        }
    }

    /// `Set-Cookie` headers for every key changed, last write wins.
    #[must_use]
    pub fn set_cookie_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.changes {
            match set_cookie(key, value.as_deref()) {
                Ok(cookie) => {
                    headers.append(SET_COOKIE, cookie);
                }
                Err(e) => error!("Failed to build cookie {}: {}", key, e),
            }
        }
        headers
    }

    fn record(&mut self, key: &str, value: Option<&str>) {
        self.changes.retain(|(changed, _)| changed != key);
        self.changes
            .push((key.to_string(), value.map(str::to_string)));
    }
}

impl PreferenceStore for CookiePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.record(key, Some(value));
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
        self.record(key, None);
    }
}

fn set_cookie(
    key: &str,
    value: Option<&str>,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let cookie = match value {
        Some(value) => {
            let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
            format!("{key}={value}; Path=/; SameSite=Lax; Max-Age={PREFERENCE_MAX_AGE}")
        }
        None => format!("{key}=; Path=/; SameSite=Lax; Max-Age=0"),
    };
    HeaderValue::from_str(&cookie)
}
