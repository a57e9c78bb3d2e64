//! End-to-end tests of the HTTP client against a local mock gateway

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smsgate::client::{ApiError, GatewayApi, HttpGatewayApi};
use smsgate::config::{AdminConfig, GatewayConfig};
use smsgate::scope::ViewScope;
use smsgate::session::{AuthStatus, SessionContext};
use smsgate::store::StoreError;
use smsgate::Console;
use smsgate_shared::{
    BindMode, Connector, ConnectorKind, ConnectorStatus, LoginForm, LoginRequest, LoginResponse,
    ReconnectPolicy, SessionUser, SmppSettings,
};

const TOKEN: &str = "tok-1";

#[derive(Clone, Default)]
struct Mock {
    /// Authorization header of every gateway request
    auth_headers: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Mock {
    fn record(&self, headers: &HeaderMap, call: String) -> Option<String> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        self.auth_headers
            .lock()
            .unwrap()
            .push(auth.clone().unwrap_or_default());
        self.calls.lock().unwrap().push(call);
        auth
    }

    fn last_auth(&self) -> String {
        self.auth_headers.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn authorized(auth: Option<&str>) -> bool {
    match auth {
        Some(value) => value == format!("Bearer {}", TOKEN) || value.starts_with("Basic "),
        None => false,
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Token expired"}))).into_response()
}

fn admin() -> SessionUser {
    SessionUser {
        id: "1".to_string(),
        username: "admin".to_string(),
        roles: vec!["admin".to_string()],
    }
}

fn carrier(cid: &str) -> Connector {
    Connector {
        id: cid.to_string(),
        cid: cid.to_string(),
        kind: ConnectorKind::Smpp(SmppSettings {
            host: "smsc.example.net".to_string(),
            port: 2775,
            system_id: "smppclient".to_string(),
            password: None,
            system_type: String::new(),
            bind_mode: BindMode::Transceiver,
            address_range: String::new(),
            use_ssl: false,
        }),
        status: ConnectorStatus::Connected,
        reconnect: ReconnectPolicy::default(),
    }
}

async fn login(Json(request): Json<LoginRequest>) -> Response {
    if request.username == "admin" && request.password == "secret" {
        Json(LoginResponse {
            token: TOKEN.to_string(),
            user: admin(),
            expires_in: 3600,
        })
        .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid credentials"}))).into_response()
    }
}

async fn validate(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let auth = mock.record(&headers, "GET /auth/validate".to_string());
    if authorized(auth.as_deref()) {
        StatusCode::OK.into_response()
    } else {
        unauthorized()
    }
}

async fn list_connectors(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let auth = mock.record(&headers, "GET /connectors".to_string());
    if !authorized(auth.as_deref()) {
        return unauthorized();
    }
    Json(vec![carrier("carrier1"), carrier("carrier2")]).into_response()
}

async fn stop_connector(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let auth = mock.record(&headers, format!("POST /connectors/{}/stop", id));
    if !authorized(auth.as_deref()) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn slow_stats(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    mock.record(&headers, "GET /stats".to_string());
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({})).into_response()
}

async fn spawn_gateway() -> (String, Mock) {
    let mock = Mock::default();
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/validate", get(validate))
        .route("/connectors", get(list_connectors))
        .route("/connectors/:id/stop", post(stop_connector))
        .route("/stats/system", get(slow_stats))
        .route("/stats/smpp", get(slow_stats))
        .route("/stats/http", get(slow_stats))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

fn config(base_url: &str) -> AdminConfig {
    let mut config = AdminConfig::with_api_url(base_url);
    config.timeout = Duration::from_millis(300);
    config
}

fn console(config: &AdminConfig, session: SessionContext) -> Console {
    let api = HttpGatewayApi::new(config, session.clone()).unwrap();
    Console::new(Arc::new(api), session)
}

#[tokio::test]
async fn test_login_persists_and_restores_session() {
    let (base_url, mock) = spawn_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&base_url);
    config.data_dir = dir.path().to_path_buf();

    let first = Console::from_config(&config).unwrap();
    let before = chrono::Utc::now();
    let session = first.auth.login(LoginForm::new("admin", "secret")).await.unwrap();
    let after = chrono::Utc::now();
    assert_eq!(session.token, TOKEN);
    assert!(session.expires_at >= before + chrono::Duration::seconds(3600));
    assert!(session.expires_at <= after + chrono::Duration::seconds(3600));
    assert_eq!(first.session.status().await, AuthStatus::Authenticated);
    first.teardown().await;

    let second = Console::from_config(&config).unwrap();
    assert_eq!(second.init().await, AuthStatus::Authenticated);
    assert_eq!(second.session.user().await.unwrap().username, "admin");
    assert_eq!(mock.last_auth(), format!("Bearer {}", TOKEN));
}

#[tokio::test]
async fn test_wrong_password_shows_gateway_message() {
    let (base_url, _mock) = spawn_gateway().await;
    let console = console(&config(&base_url), SessionContext::in_memory());

    let err = console
        .auth
        .login(LoginForm::new("admin", "nope"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(console.auth.error().await.as_deref(), Some("Invalid credentials"));
    assert_eq!(console.session.status().await, AuthStatus::Anonymous);
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let (base_url, mock) = spawn_gateway().await;
    let console = console(&config(&base_url), SessionContext::in_memory());
    console.auth.login(LoginForm::new("admin", "secret")).await.unwrap();

    let count = console.connectors.fetch_all().await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(mock.last_auth(), "Bearer tok-1");
}

#[tokio::test]
async fn test_unauthorized_response_clears_session() {
    let (base_url, _mock) = spawn_gateway().await;
    let session = SessionContext::in_memory();
    session
        .establish(smsgate_shared::Session {
            token: "stale".to_string(),
            user: admin(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        })
        .await
        .unwrap();
    let mut events = session.subscribe();
    let console = console(&config(&base_url), session.clone());

    let err = console.connectors.fetch_all().await.unwrap_err();

    assert!(matches!(err, StoreError::Api(ref e) if e.is_unauthorized()));
    assert_eq!(session.status().await, AuthStatus::Anonymous);
    assert!(session.token().await.is_none());
    events.changed().await.unwrap();
    assert_eq!(events.borrow().status, AuthStatus::Anonymous);
}

#[tokio::test]
async fn test_slow_gateway_times_out() {
    let (base_url, _mock) = spawn_gateway().await;
    let session = SessionContext::in_memory();
    let api = HttpGatewayApi::new(&config(&base_url), session).unwrap();

    let err = api.system_stats().await.unwrap_err();

    assert_eq!(err, ApiError::Timeout);
    assert_eq!(err.user_message(), "The gateway did not respond in time. Try again.");
}

#[tokio::test]
async fn test_stats_refresh_reports_timeout() {
    let (base_url, _mock) = spawn_gateway().await;
    let console = console(&config(&base_url), SessionContext::in_memory());

    let err = console.stats.refresh_in(&ViewScope::new()).await.unwrap_err();

    assert!(matches!(err, StoreError::Api(ApiError::Timeout)));
    assert!(console.stats.state().await.error.is_some());
}

#[tokio::test]
async fn test_stop_connector_marks_it_disconnected() {
    let (base_url, mock) = spawn_gateway().await;
    let console = console(&config(&base_url), SessionContext::in_memory());
    console.auth.login(LoginForm::new("admin", "secret")).await.unwrap();
    console.connectors.fetch_all().await.unwrap();

    console.connectors.stop("carrier1").await.unwrap();

    let connector = console.connectors.get("carrier1").await.unwrap();
    assert_eq!(connector.status, ConnectorStatus::Disconnected);
    assert_eq!(
        console.connectors.get("carrier2").await.unwrap().status,
        ConnectorStatus::Connected
    );
    assert!(mock.calls().contains(&"POST /connectors/carrier1/stop".to_string()));
}

#[tokio::test]
async fn test_gateway_credentials_use_basic_auth() {
    let (base_url, mock) = spawn_gateway().await;
    let mut config = config(&base_url);
    config.gateway = Some(GatewayConfig {
        url: base_url.clone(),
        username: Some("gw".to_string()),
        password: Some("pw".to_string()),
    });
    let console = console(&config, SessionContext::in_memory());

    console.connectors.fetch_all().await.unwrap();

    // base64("gw:pw")
    assert_eq!(mock.last_auth(), "Basic Z3c6cHc=");
}
