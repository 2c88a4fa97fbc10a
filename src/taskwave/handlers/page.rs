use super::cookies::CookiePreferences;
use crate::page::PageState;
use axum::{
    extract::RawQuery,
    http::HeaderMap,
    response::{IntoResponse, Json},
};

#[utoipa::path(
    get,
    path= "/v1/page",
    params(
        ("ref" = Option<String>, Query, description = "Username of the referring account")
    ),
    responses (
        (status = 200, description = "Initial state of the sign-in page", body = PageState),
    ),
    tag= "page"
)]
pub async fn page(RawQuery(query): RawQuery, headers: HeaderMap) -> impl IntoResponse {
    let preferences = CookiePreferences::from_headers(&headers);
    Json(PageState::load(query.as_deref(), &preferences))
}
