use super::cookies::CookiePreferences;
use crate::preferences::set_dark_mode;
use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DarkMode {
    enabled: bool,
}

#[utoipa::path(
    put,
    path= "/v1/preferences/dark-mode",
    request_body = DarkMode,
    responses (
        (status = 200, description = "Preference stored in a cookie", body = DarkMode),
        (status = 400, description = "Missing payload"),
    ),
    tag= "page"
)]
pub async fn dark_mode(payload: Option<Json<DarkMode>>) -> impl IntoResponse {
    let Some(Json(dark_mode)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    debug!("dark mode: {}", dark_mode.enabled);

    let mut preferences = CookiePreferences::default();
    set_dark_mode(&mut preferences, dark_mode.enabled);

    (preferences.set_cookie_headers(), Json(dark_mode)).into_response()
}
