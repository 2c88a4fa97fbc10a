#![allow(clippy::needless_for_each)]

use crate::{directory::DirectoryConnector, workflow::WorkflowConfig};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        header::{CONTENT_TYPE, COOKIE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::page::page,
        handlers::signup::signup,
        handlers::signin::signin,
        handlers::reset::password_reset,
        handlers::preferences::dark_mode,
    ),
    components(
        schemas(
            handlers::health::Health,
            handlers::signup::SignupRequest,
            handlers::signin::SigninRequest,
            handlers::reset::ResetRequest,
            handlers::preferences::DarkMode,
            crate::present::Outcome,
            crate::present::Notice,
            crate::page::PageState,
            crate::page::ReferralField,
            crate::page::View,
        )
    ),
    tags(
        (name = "taskwave", description = "Account registration and sign-in"),
        (name = "auth", description = "Signup, signin and password reset"),
        (name = "page", description = "Sign-in page state and preferences"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router.
///
/// `frontend_origin`, when set, is the only origin allowed by CORS, with
/// credentials so preference cookies travel.
#[must_use]
pub fn router(
    connector: Arc<dyn DirectoryConnector>,
    config: WorkflowConfig,
    frontend_origin: Option<HeaderValue>,
) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/v1/page", get(handlers::page))
        .route("/v1/signup", post(handlers::signup))
        .route("/v1/signin", post(handlers::signin))
        .route("/v1/password-reset", post(handlers::password_reset))
        .route("/v1/preferences/dark-mode", put(handlers::dark_mode))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()));

    if let Some(origin) = frontend_origin {
        let cors = CorsLayer::new()
            .allow_headers([CONTENT_TYPE, COOKIE])
            .allow_methods([Method::GET, Method::POST, Method::PUT])
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true);
        app = app.layer(cors);
    }

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(connector))
            .layer(Extension(config)),
    )
}

/// Start the server
/// # Errors
/// Return error if the frontend origin is invalid or the listener fails
pub async fn new(
    port: u16,
    connector: Arc<dyn DirectoryConnector>,
    config: WorkflowConfig,
    frontend_origin: Option<String>,
) -> Result<()> {
    let frontend_origin = frontend_origin
        .as_deref()
        .map(self::frontend_origin)
        .transpose()?;

    info!("Using {} backend", connector.kind());

    let app = router(connector, config, frontend_origin);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_url)
        .with_context(|| format!("Invalid frontend origin: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend origin must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
