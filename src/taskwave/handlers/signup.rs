use super::outcome;
use crate::{
    directory::DirectoryConnector,
    present::Outcome,
    workflow::{register, SignupError, SignupForm, WorkflowConfig},
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
pub struct SignupRequest {
    full_name: String,
    username: String,
    email: String,
    password: String,
    confirm_password: String,
    /// Referrer's username, empty when nobody referred the account.
    #[serde(default)]
    referred_by: String,
}

impl From<SignupRequest> for SignupForm {
    fn from(request: SignupRequest) -> Self {
        Self {
            full_name: request.full_name,
            username: request.username,
            email: request.email,
            password: SecretString::from(request.password),
            confirm_password: SecretString::from(request.confirm_password),
            referred_by: request.referred_by,
        }
    }
}

fn status(err: &SignupError) -> StatusCode {
    match err {
        SignupError::Validation(_) => StatusCode::BAD_REQUEST,
        SignupError::UsernameTaken | SignupError::EmailInUse => StatusCode::CONFLICT,
        SignupError::Credential(_) | SignupError::ProfileWrite { .. } | SignupError::Lookup(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

#[utoipa::path(
    post,
    path= "/v1/signup",
    request_body = SignupRequest,
    responses (
        (status = 201, description = "Account created", body = Outcome),
        (status = 400, description = "Form rejected", body = Outcome),
        (status = 409, description = "Username or email already in use", body = Outcome),
        (status = 502, description = "Backend failure", body = Outcome),
    ),
    tag= "auth"
)]
#[instrument(skip(connector, config, payload))]
pub async fn signup(
    connector: Extension<Arc<dyn DirectoryConnector>>,
    config: Extension<WorkflowConfig>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return outcome(
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            &Outcome::alert("Missing payload"),
        );
    };

    let form = SignupForm::from(request);
    let directory = connector.connect();
    let result = register(directory.as_ref(), &form, &config).await;

    let code = match &result {
        Ok(_) => StatusCode::CREATED,
        Err(err) => status(err),
    };

    outcome(code, HeaderMap::new(), &Outcome::signup(&result, &config))
}
