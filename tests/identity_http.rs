//! End-to-end: controller + HTTP client + file store against an in-process
//! fake of the portal identity service.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use sports_portal::error::{INVALID_CREDENTIALS_MESSAGE, NETWORK_MESSAGE, SERVER_MESSAGE};
use sports_portal::guard::{self, GuardDecision, Route};
use sports_portal::{
    AuthController, AuthError, Credentials, FileSessionStore, HttpIdentityClient, HydrationPolicy,
    RegistrationPayload, Role, SessionStatus, SessionStore, Timeouts,
};
use tempfile::TempDir;

type Reply = (StatusCode, Json<Value>);

// =============================================================
// Fake identity service
// =============================================================

#[derive(Default)]
struct FakeIdentity {
    accounts: Mutex<HashMap<String, (String, Value)>>,
    tokens: Mutex<HashMap<String, Value>>,
    me_calls: AtomicUsize,
}

impl FakeIdentity {
    fn with_account(self, email: &str, password: &str, role: &str) -> Self {
        let user = json!({
            "id": format!("u-{email}"),
            "name": "Rajesh Kumar",
            "email": email,
            "phone": "+91-9876543210",
            "role": role,
            "created_at": "2024-05-01T10:00:00",
        });
        self.accounts.lock().unwrap().insert(email.to_owned(), (password.to_owned(), user));
        self
    }

    fn issue(&self, user: &Value) -> Value {
        let mut tokens = self.tokens.lock().unwrap();
        let token = format!("jwt-{}", tokens.len() + 1);
        tokens.insert(token.clone(), user.clone());
        json!({ "token": token, "user": user })
    }
}

fn detail(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "detail": message })))
}

async fn login(State(fake): State<Arc<FakeIdentity>>, Json(body): Json<Value>) -> Reply {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let account = fake.accounts.lock().unwrap().get(email).cloned();
    match account {
        Some((expected, user)) if expected == password => (StatusCode::OK, Json(fake.issue(&user))),
        _ => detail(StatusCode::UNAUTHORIZED, "Incorrect email or password"),
    }
}

async fn register(State(fake): State<Arc<FakeIdentity>>, Json(body): Json<Value>) -> Reply {
    let email = body["email"].as_str().unwrap_or_default().to_owned();
    if fake.accounts.lock().unwrap().contains_key(&email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let user = json!({
        "id": format!("u-{email}"),
        "name": body["name"],
        "email": &email,
        "phone": body["phone"],
        "role": body["role"],
        "created_at": "2024-05-02T09:30:00",
    });
    let password = body["password"].as_str().unwrap_or_default().to_owned();
    fake.accounts.lock().unwrap().insert(email, (password, user.clone()));
    (StatusCode::OK, Json(fake.issue(&user)))
}

async fn me(
    State(fake): State<Arc<FakeIdentity>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    fake.me_calls.fetch_add(1, Ordering::SeqCst);
    let token = query.get("token").cloned().unwrap_or_default();
    let bearer = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if bearer != format!("Bearer {token}") {
        return detail(StatusCode::UNAUTHORIZED, "Invalid authentication credentials");
    }
    match fake.tokens.lock().unwrap().get(&token) {
        Some(user) => (StatusCode::OK, Json(user.clone())),
        None => detail(StatusCode::UNAUTHORIZED, "Invalid authentication credentials"),
    }
}

fn identity_app(fake: Arc<FakeIdentity>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .with_state(fake)
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/api")
}

// =============================================================
// Harness
// =============================================================

struct Portal {
    base_url: String,
    dir: TempDir,
    timeouts: Timeouts,
}

impl Portal {
    async fn start(fake: Arc<FakeIdentity>) -> Self {
        Self::at(serve(identity_app(fake)).await)
    }

    fn at(base_url: String) -> Self {
        Self { base_url, dir: TempDir::new().unwrap(), timeouts: Timeouts::default() }
    }

    fn store(&self) -> FileSessionStore {
        FileSessionStore::new(self.dir.path().join("profile").join("session.json"))
    }

    /// A fresh controller on the shared session file, already hydrated.
    async fn open(&self, policy: HydrationPolicy) -> AuthController {
        let client = HttpIdentityClient::new(self.base_url.clone(), self.timeouts).unwrap();
        let controller = AuthController::new(Arc::new(client), Arc::new(self.store()), policy);
        controller.init().await;
        controller
    }
}

fn member() -> Arc<FakeIdentity> {
    Arc::new(FakeIdentity::default().with_account("a@b.com", "secret1", "player"))
}

// =============================================================
// Scenarios
// =============================================================

#[tokio::test]
async fn login_then_reload_validates_once_and_grants_dashboard() {
    let fake = member();
    let portal = Portal::start(fake.clone()).await;

    let first = portal.open(HydrationPolicy::Validate).await;
    assert_eq!(first.status(), SessionStatus::Unauthenticated);
    assert_eq!(fake.me_calls.load(Ordering::SeqCst), 0);

    let user = first.login(Credentials::new("a@b.com", "secret1")).await.unwrap();
    assert_eq!(user.email, "a@b.com");
    assert_eq!(user.created_at.as_deref(), Some("2024-05-01T10:00:00"));
    let stored = portal.store().load().unwrap();
    assert_eq!(Some(stored.token.as_str()), first.session().token());
    first.teardown();

    let second = portal.open(HydrationPolicy::Validate).await;
    assert_eq!(second.status(), SessionStatus::Authenticated);
    assert_eq!(second.session().user(), Some(&user));
    assert_eq!(fake.me_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        guard::settle(&mut second.subscribe(), Route::Dashboard).await,
        GuardDecision::Render(Route::Dashboard)
    );
}

#[tokio::test]
async fn trusted_reload_never_calls_the_service() {
    let fake = member();
    let portal = Portal::start(fake.clone()).await;
    portal.open(HydrationPolicy::Trust).await.login(Credentials::new("a@b.com", "secret1")).await.unwrap();

    let reloaded = portal.open(HydrationPolicy::Trust).await;

    assert!(reloaded.session().is_authenticated());
    assert_eq!(fake.me_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_password_reports_invalid_credentials() {
    let portal = Portal::start(member()).await;
    let controller = portal.open(HydrationPolicy::Validate).await;

    let err = controller.login(Credentials::new("a@b.com", "wrong")).await.unwrap_err();

    assert_eq!(err, AuthError::InvalidCredentials("Incorrect email or password".to_owned()));
    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
    assert_eq!(controller.session().last_error(), Some(INVALID_CREDENTIALS_MESSAGE));
    assert!(portal.store().load().is_none());
}

#[tokio::test]
async fn register_coach_then_duplicate_is_rejected() {
    let portal = Portal::start(member()).await;
    let payload = RegistrationPayload {
        name: "Priya Nair".to_owned(),
        email: "priya@club.test".to_owned(),
        password: "whistle9".to_owned(),
        phone: "+91 98765 43210".to_owned(),
        role: Role::Coach,
    };

    let controller = portal.open(HydrationPolicy::Validate).await;
    let user = controller.register(payload.clone()).await.unwrap();
    assert_eq!(user.role, Role::Coach);
    assert_eq!(controller.status(), SessionStatus::Authenticated);

    controller.logout();
    assert!(portal.store().load().is_none());

    let err = controller.register(payload).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation { .. }));
    assert_eq!(controller.session().last_error(), Some("Email already registered"));
}

#[tokio::test]
async fn forged_stored_token_is_cleared_on_reload() {
    let fake = member();
    let portal = Portal::start(fake.clone()).await;
    let account = fake.accounts.lock().unwrap()["a@b.com"].1.clone();
    portal.store().save("jwt-forged", &serde_json::from_value(account).unwrap()).unwrap();

    let controller = portal.open(HydrationPolicy::Validate).await;

    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
    assert!(controller.session().has_error());
    assert!(portal.store().load().is_none());
}

#[tokio::test]
async fn server_failure_is_generic() {
    let app = Router::new().route("/api/auth/login", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }));
    let portal = Portal::at(serve(app).await);
    let controller = portal.open(HydrationPolicy::Validate).await;

    let err = controller.login(Credentials::new("a@b.com", "secret1")).await.unwrap_err();

    assert!(matches!(err, AuthError::Server { status: Some(500), .. }));
    assert_eq!(controller.session().last_error(), Some(SERVER_MESSAGE));
}

#[tokio::test]
async fn slow_service_times_out_as_network_error() {
    let app = Router::new().route(
        "/api/auth/login",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    );
    let mut portal = Portal::at(serve(app).await);
    portal.timeouts = Timeouts { request: Duration::from_millis(200), connect: Duration::from_millis(200) };
    let controller = portal.open(HydrationPolicy::Validate).await;

    let err = controller.login(Credentials::new("a@b.com", "secret1")).await.unwrap_err();

    assert!(matches!(err, AuthError::Network(_)));
    assert_eq!(controller.session().last_error(), Some(NETWORK_MESSAGE));
}

#[tokio::test]
async fn unreachable_service_keeps_stored_session() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let portal = Portal::at(format!("http://{addr}/api"));
    let account: sports_portal::User = serde_json::from_value(json!({
        "id": "u1", "name": "Rajesh Kumar", "email": "a@b.com", "phone": "+91-9876543210", "role": "official"
    }))
    .unwrap();
    portal.store().save("jwt-1", &account).unwrap();

    let controller = portal.open(HydrationPolicy::Validate).await;

    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
    assert_eq!(controller.session().last_error(), Some(NETWORK_MESSAGE));
    assert_eq!(portal.store().load().map(|r| r.token), Some("jwt-1".to_owned()));
}

#[tokio::test]
async fn blank_token_reply_never_reaches_the_session_file() {
    let app = Router::new().route(
        "/api/auth/login",
        post(|| async {
            Json(json!({
                "token": "",
                "user": {"id": "u1", "name": "Rajesh Kumar", "email": "a@b.com", "phone": "+91-9876543210", "role": "player"}
            }))
        }),
    );
    let portal = Portal::at(serve(app).await);
    let controller = portal.open(HydrationPolicy::Trust).await;

    let err = controller.login(Credentials::new("a@b.com", "secret1")).await.unwrap_err();

    assert!(matches!(err, AuthError::Server { status: Some(200), .. }));
    assert_eq!(controller.status(), SessionStatus::Unauthenticated);
    assert!(portal.store().load().is_none());
    assert_eq!(portal.open(HydrationPolicy::Trust).await.status(), SessionStatus::Unauthenticated);
}
