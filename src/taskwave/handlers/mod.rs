pub mod cookies;
pub mod health;
pub mod page;
pub mod preferences;
pub mod reset;
pub mod signin;
pub mod signup;

pub use self::cookies::CookiePreferences;
pub use self::health::health;
pub use self::page::page;
pub use self::preferences::dark_mode;
pub use self::reset::password_reset;
pub use self::signin::signin;
pub use self::signup::signup;

// common functions for the handlers
use crate::present::Outcome;
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};

/// Outcome as the JSON body, with any preference cookies.
fn outcome(status: StatusCode, headers: HeaderMap, outcome: &Outcome) -> Response {
    (status, headers, Json(outcome)).into_response()
}
