use super::outcome;
use crate::{
    directory::DirectoryConnector,
    present::Outcome,
    workflow::{request_reset, ResetError},
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetRequest {
    email: String,
}

#[utoipa::path(
    post,
    path= "/v1/password-reset",
    request_body = ResetRequest,
    responses (
        (status = 200, description = "Reset link sent", body = Outcome),
        (status = 400, description = "Email rejected", body = Outcome),
        (status = 502, description = "Backend refused to send the link", body = Outcome),
    ),
    tag= "auth"
)]
#[instrument(skip(connector, payload))]
pub async fn password_reset(
    connector: Extension<Arc<dyn DirectoryConnector>>,
    payload: Option<Json<ResetRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return outcome(
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            &Outcome::alert("Missing payload"),
        );
    };

    let directory = connector.connect();
    let result = request_reset(directory.as_ref(), &request.email).await;

    let code = match &result {
        Ok(()) => StatusCode::OK,
        Err(ResetError::Validation(_)) => StatusCode::BAD_REQUEST,
        Err(ResetError::Backend(_)) => StatusCode::BAD_GATEWAY,
    };

    outcome(code, HeaderMap::new(), &Outcome::reset(&result, &request.email))
}
