use super::{cookies::CookiePreferences, outcome};
use crate::{
    directory::DirectoryConnector,
    present::Outcome,
    workflow::{sign_in, SigninError, SigninForm, WorkflowConfig},
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct SigninRequest {
    email: String,
    password: String,
    #[serde(default)]
    remember_me: bool,
}

impl From<SigninRequest> for SigninForm {
    fn from(request: SigninRequest) -> Self {
        Self {
            email: request.email,
            password: SecretString::from(request.password),
            remember_me: request.remember_me,
        }
    }
}

fn status(err: &SigninError) -> StatusCode {
    match err {
        SigninError::Validation(_) => StatusCode::BAD_REQUEST,
        SigninError::WrongCredentials => StatusCode::UNAUTHORIZED,
        SigninError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
    }
}

#[utoipa::path(
    post,
    path= "/v1/signin",
    request_body = SigninRequest,
    responses (
        (status = 200, description = "Signed in; the remembered email cookie is set or cleared", body = Outcome),
        (status = 400, description = "Form rejected", body = Outcome),
        (status = 401, description = "Invalid email or password", body = Outcome),
        (status = 429, description = "Too many failed attempts", body = Outcome),
    ),
    tag= "auth"
)]
#[instrument(skip(headers, connector, config, payload))]
pub async fn signin(
    headers: HeaderMap,
    connector: Extension<Arc<dyn DirectoryConnector>>,
    config: Extension<WorkflowConfig>,
    payload: Option<Json<SigninRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return outcome(
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            &Outcome::alert("Missing payload"),
        );
    };

    let form = SigninForm::from(request);
    let mut preferences = CookiePreferences::from_headers(&headers);
    let directory = connector.connect();
    let result = sign_in(directory.as_ref(), &mut preferences, &form).await;

    let code = match &result {
        Ok(_) => StatusCode::OK,
        Err(err) => status(err),
    };

    outcome(
        code,
        preferences.set_cookie_headers(),
        &Outcome::signin(&result, &config),
    )
}
