//! The REST adapter against a local stand-in for the credential service and
//! the document store.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, Method, StatusCode, Uri,
    },
    Json, Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use taskwave::{
    directory::{
        firebase::{FirebaseClient, FirebaseConfig},
        AccountDirectory, DirectoryConnector, DirectoryError,
    },
    page::{AuthPage, Submission},
    preferences::MemoryPreferences,
    present::{Acknowledgement, Control, Notice, Outcome, Presenter},
    workflow::{
        register, request_reset, sign_in, ReferralCredit, ResetError, SigninError, SigninForm,
        SignupForm, WorkflowConfig,
    },
};
use tokio::net::TcpListener;

#[derive(Default)]
struct Backend {
    /// email -> (uid, password)
    credentials: HashMap<String, (String, String)>,
    /// uid -> typed fields
    users: HashMap<String, Value>,
    settings: Option<Value>,
    /// (path, bearer token) of every document request
    document_calls: Vec<(String, Option<String>)>,
}

type Shared = Arc<Mutex<Backend>>;

fn auth_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": 400, "message": message } })),
    )
}

fn identity(uid: &str, email: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "localId": uid, "email": email, "idToken": format!("token-{uid}") })),
    )
}

async fn mock(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let Ok(mut backend) = state.lock() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(Value::Null));
    };

    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    if path.ends_with("/accounts:signUp") {
        if backend.credentials.contains_key(&email) {
            return auth_error("EMAIL_EXISTS");
        }
        if password.len() < 6 {
            return auth_error("WEAK_PASSWORD : Password should be at least 6 characters");
        }
        let uid = format!("uid{}", backend.credentials.len() + 1);
        backend
            .credentials
            .insert(email.clone(), (uid.clone(), password));
        return identity(&uid, &email);
    }
    if path.ends_with("/accounts:signInWithPassword") {
        return match backend.credentials.get(&email) {
            Some((uid, stored)) if *stored == password => identity(uid, &email),
            _ => auth_error("INVALID_LOGIN_CREDENTIALS"),
        };
    }
    if path.ends_with("/accounts:sendOobCode") {
        return if backend.credentials.contains_key(&email) {
            (StatusCode::OK, Json(json!({ "email": email })))
        } else {
            auth_error("EMAIL_NOT_FOUND")
        };
    }

    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    backend.document_calls.push((path.clone(), bearer));

    if path.ends_with(":runQuery") {
        let wanted = &body["structuredQuery"]["where"]["fieldFilter"]["value"]["stringValue"];
        let found = backend
            .users
            .iter()
            .find(|(_, fields)| &fields["username"]["stringValue"] == wanted)
            .map(|(uid, fields)| {
                json!([{ "document": {
                    "name": format!("projects/p/databases/(default)/documents/users/{uid}"),
                    "fields": fields,
                } }])
            });
        return (
            StatusCode::OK,
            Json(found.unwrap_or_else(|| json!([{ "readTime": "2024-05-01T10:00:00Z" }]))),
        );
    }
    if method == Method::GET && path.ends_with("/settings/general") {
        return match &backend.settings {
            Some(fields) => (StatusCode::OK, Json(json!({ "fields": fields }))),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": { "code": 404, "message": "not found" } })),
            ),
        };
    }
    if path.ends_with(":commit") {
        let write = &body["writes"][0];
        if let Some(name) = write["update"]["name"].as_str() {
            let uid = name.rsplit('/').next().unwrap_or_default().to_string();
            backend.users.insert(uid, write["update"]["fields"].clone());
            return (StatusCode::OK, Json(json!({ "writeResults": [{}] })));
        }
        if let Some(name) = write["transform"]["document"].as_str() {
            let uid = name.rsplit('/').next().unwrap_or_default().to_string();
            let Some(fields) = backend.users.get_mut(&uid) else {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": { "code": 404, "message": format!("No document to update: {name}") } })),
                );
            };
            for transform in write["transform"]["fieldTransforms"].as_array().into_iter().flatten() {
                let field = transform["fieldPath"].as_str().unwrap_or_default();
                let by = transform["increment"]["integerValue"]
                    .as_str()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                let current = fields[field]["integerValue"]
                    .as_str()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                fields[field] = json!({ "integerValue": (current + by).to_string() });
            }
            return (StatusCode::OK, Json(json!({ "writeResults": [{}] })));
        }
    }

    (StatusCode::NOT_FOUND, Json(Value::Null))
}

async fn serve() -> Result<(FirebaseClient, Shared)> {
    let state = Shared::default();
    let client = spawn(Router::new().fallback(mock).with_state(state.clone())).await?;
    Ok((client, state))
}

/// Serve `app` on a free port and point a client at it.
async fn spawn(app: Router) -> Result<FirebaseClient> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });

    Ok(FirebaseClient::new(FirebaseConfig {
        api_key: SecretString::from("test-key".to_string()),
        project_id: "taskwave-test".to_string(),
        auth_url: format!("http://{addr}/identitytoolkit.googleapis.com/v1"),
        firestore_url: format!("http://{addr}/v1"),
        timeout: Duration::from_secs(5),
    })?)
}

fn signup(username: &str, email: &str, referred_by: &str) -> SignupForm {
    SignupForm {
        full_name: "Bob Builder".to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password: SecretString::from("hunter22".to_string()),
        confirm_password: SecretString::from("hunter22".to_string()),
        referred_by: referred_by.to_string(),
    }
}

fn user_field(state: &Shared, uid: &str, name: &str) -> Value {
    state
        .lock()
        .map(|backend| backend.users[uid][name].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn referral_signup_over_rest() -> Result<()> {
    let (client, state) = serve().await?;
    let config = WorkflowConfig::default();

    let alice = register(
        client.connect().as_ref(),
        &signup("ALICE", "alice@example.com", ""),
        &config,
    )
    .await?;
    assert_eq!(alice.uid, "uid1");
    assert_eq!(
        user_field(&state, "uid1", "balance"),
        json!({ "integerValue": "0" })
    );

    if let Ok(mut backend) = state.lock() {
        backend.settings = Some(json!({ "referralBonus": { "integerValue": "10" } }));
    }

    let bob = register(
        client.connect().as_ref(),
        &signup("bob", "bob@example.com", "ALICE"),
        &config,
    )
    .await?;
    assert_eq!(
        bob.referral,
        ReferralCredit::Credited {
            referrer_uid: "uid1".to_string(),
            amount: taskwave::directory::Amount::new(10.0).unwrap_or_default(),
        }
    );

    assert_eq!(
        user_field(&state, "uid1", "balance"),
        json!({ "integerValue": "10" })
    );
    assert_eq!(
        user_field(&state, "uid1", "referralEarnings"),
        json!({ "integerValue": "10" })
    );
    assert_eq!(
        user_field(&state, "uid1", "referralsCount"),
        json!({ "integerValue": "1" })
    );
    assert_eq!(
        user_field(&state, "uid2", "referredBy"),
        json!({ "stringValue": "ALICE" })
    );

    // Writes after the credential exists run as that identity.
    let commits: Vec<Option<String>> = state
        .lock()
        .map(|backend| {
            backend
                .document_calls
                .iter()
                .filter(|(path, _)| path.ends_with(":commit"))
                .map(|(_, bearer)| bearer.clone())
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(
        commits,
        vec![
            Some("token-uid1".to_string()),
            Some("token-uid2".to_string()),
            Some("token-uid2".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_email_and_username_over_rest() -> Result<()> {
    let (client, _state) = serve().await?;
    let config = WorkflowConfig::default();

    register(
        client.connect().as_ref(),
        &signup("bob", "bob@example.com", ""),
        &config,
    )
    .await?;

    let taken = register(
        client.connect().as_ref(),
        &signup("bob", "other@example.com", ""),
        &config,
    )
    .await;
    assert_eq!(
        taken.map_err(|e| e.user_message()).err(),
        Some("This username is already taken. Please choose another one.".to_string())
    );

    let in_use = register(
        client.connect().as_ref(),
        &signup("bobby", "bob@example.com", ""),
        &config,
    )
    .await;
    assert_eq!(
        in_use.map_err(|e| e.user_message()).err(),
        Some("This email address is already in use.".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn signin_and_reset_over_rest() -> Result<()> {
    let (client, _state) = serve().await?;
    register(
        client.connect().as_ref(),
        &signup("ada", "ada@example.com", ""),
        &WorkflowConfig::default(),
    )
    .await?;

    let mut prefs = MemoryPreferences::default();
    let directory = client.connect();
    let signed_in = sign_in(
        directory.as_ref(),
        &mut prefs,
        &SigninForm {
            email: "ada@example.com".to_string(),
            password: SecretString::from("hunter22".to_string()),
            remember_me: true,
        },
    )
    .await?;
    assert_eq!(signed_in.uid, "uid1");

    let wrong = sign_in(
        client.connect().as_ref(),
        &mut prefs,
        &SigninForm {
            email: "ada@example.com".to_string(),
            password: SecretString::from("hunter23".to_string()),
            remember_me: false,
        },
    )
    .await;
    assert_eq!(wrong, Err(SigninError::WrongCredentials));

    assert!(request_reset(client.connect().as_ref(), "ada@example.com")
        .await
        .is_ok());
    assert_eq!(
        request_reset(client.connect().as_ref(), "eve@example.com").await,
        Err(ResetError::Backend(
            "There is no user record corresponding to this identifier.".to_string()
        ))
    );
    Ok(())
}

/// Acknowledges every notice straight away.
struct Silent;

impl Presenter for Silent {
    fn set_busy(&self, _control: Control, _busy: bool) {}

    fn alert(&self, _message: &str) {}

    fn notice(&self, _notice: &Notice) -> Acknowledgement {
        let (dismissal, acknowledgement) = Acknowledgement::channel();
        dismissal.acknowledge();
        acknowledgement
    }

    fn navigate(&self, _target: &str) {}
}

#[tokio::test]
async fn page_submits_do_not_share_an_identity() -> Result<()> {
    let (client, state) = serve().await?;
    register(
        client.connect().as_ref(),
        &signup("ada", "ada@example.com", ""),
        &WorkflowConfig::default(),
    )
    .await?;

    let page = AuthPage::load(
        Arc::new(client),
        WorkflowConfig::default(),
        Arc::new(Silent),
        Box::new(MemoryPreferences::default()),
        None,
    );
    let signed_in = page
        .submit_signin(SigninForm {
            email: "ada@example.com".to_string(),
            password: SecretString::from("hunter22".to_string()),
            remember_me: false,
        })
        .await;
    assert!(matches!(
        signed_in,
        Submission::Completed(Outcome::Navigate { .. })
    ));

    let before = state.lock().map(|b| b.document_calls.len()).unwrap_or_default();
    let created = page
        .submit_signup(signup("bob", "bob@example.com", ""))
        .await;
    assert!(matches!(created, Submission::Completed(Outcome::Notice { .. })));

    let calls: Vec<(String, Option<String>)> = state
        .lock()
        .map(|b| b.document_calls[before..].to_vec())
        .unwrap_or_default();
    // Username check runs anonymously, then settings and profile as bob.
    assert_eq!(calls.len(), 3);
    assert!(calls[0].0.ends_with(":runQuery"));
    assert_eq!(calls[0].1, None);
    assert!(calls[1..]
        .iter()
        .all(|(_, bearer)| bearer.as_deref() == Some("token-uid2")));
    Ok(())
}

#[tokio::test]
async fn missing_settings_document_means_no_bonus() -> Result<()> {
    let (client, _state) = serve().await?;
    let directory = client.connect();
    assert_eq!(directory.get_setting("referralBonus").await?, None);
    Ok(())
}

#[tokio::test]
async fn html_error_page_reports_the_status() -> Result<()> {
    let client = spawn(Router::new().fallback(|| async {
        (
            StatusCode::BAD_GATEWAY,
            [(CONTENT_TYPE, "text/html")],
            "<html><body>Bad Gateway</body></html>",
        )
    }))
    .await?;

    assert_eq!(
        client.connect().find_by_username("bob").await,
        Err(DirectoryError::Read("502 Bad Gateway".to_string()))
    );
    Ok(())
}
