//! Integration tests for the gateway using a scripted transport.
//!
//! The mock never touches the network: it records every request it is
//! handed and answers with the next scripted response.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use classgate_protocol::{Claims, Role, encode_unsigned};
use classgate_session::{
    ClearReason, ManualClock, MemoryStorage, SessionConfig, SessionManager, Storage, TOKEN_KEY,
    USER_KEY,
};
use classgate_transport::{
    Access, ApiRequest, ApiResponse, Gateway, GatewayError, HttpTransport, LOGIN_ENDPOINT,
    LOGIN_PATH, MemoryNavigator, Method, Navigator, StatusCode, TransportError,
    UNAUTHORIZED_PATH,
};

const NOW: i64 = 1_700_000_000;

// =========================================================================
// Mock transport
// =========================================================================

#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    sent: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    fn answering(responses: impl IntoIterator<Item = ApiResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            sent: Mutex::default(),
        }
    }

    fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".into())))
    }
}

// =========================================================================
// Helpers
// =========================================================================

struct Fixture {
    gateway: Gateway<ScriptedTransport>,
    manager: Arc<SessionManager>,
    storage: Arc<MemoryStorage>,
    navigator: Arc<MemoryNavigator>,
}

fn token(exp: i64) -> String {
    encode_unsigned(&Claims::new("alice", exp).with_role(Role::Teacher)).unwrap()
}

/// A gateway on `/students` whose session holds `token`, if any.
fn fixture(token: Option<String>, transport: ScriptedTransport) -> Fixture {
    let storage = Arc::new(MemoryStorage::new());
    if let Some(token) = token {
        storage.set(TOKEN_KEY, &token).unwrap();
        storage.set(USER_KEY, r#"{"username":"alice"}"#).unwrap();
    }
    let manager = Arc::new(SessionManager::new(
        storage.clone(),
        Arc::new(ManualClock::new(NOW)),
        SessionConfig::default(),
    ));
    let navigator = Arc::new(MemoryNavigator::new("/students"));
    let gateway = Gateway::new(transport, manager.clone(), navigator.clone());
    Fixture {
        gateway,
        manager,
        storage,
        navigator,
    }
}

fn ok(body: &str) -> ApiResponse {
    ApiResponse::new(StatusCode::OK, body)
}

// =========================================================================
// Request phase
// =========================================================================

#[tokio::test]
async fn test_send_attaches_bearer_token() {
    let live = token(NOW + 3600);
    let f = fixture(Some(live.clone()), ScriptedTransport::answering([ok("[]")]));

    f.gateway.get("/students").await.unwrap();

    let sent = f.gateway.transport().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::GET);
    assert_eq!(sent[0].bearer_token(), Some(live.as_str()));
}

#[tokio::test]
async fn test_send_without_session_sends_no_authorization() {
    let f = fixture(None, ScriptedTransport::answering([ok("{}")]));

    f.gateway.get("/public/info").await.unwrap();

    assert_eq!(f.gateway.transport().sent()[0].bearer_token(), None);
}

#[tokio::test]
async fn test_send_expired_token_aborts_locally_and_redirects() {
    let f = fixture(Some(token(NOW - 10)), ScriptedTransport::default());

    let result = f.gateway.get("/students").await;

    assert!(matches!(result, Err(GatewayError::TokenExpired)));
    assert!(f.gateway.transport().sent().is_empty(), "nothing must be sent");
    assert!(f.storage.is_empty());
    assert_eq!(f.navigator.current_path(), LOGIN_PATH);
    assert_eq!(f.manager.last_clear_reason(), Some(ClearReason::Expired));
}

#[tokio::test]
async fn test_send_malformed_token_aborts_locally() {
    let f = fixture(Some("not-a-jwt".into()), ScriptedTransport::default());

    let result = f.gateway.get("/students").await;

    assert!(matches!(result, Err(GatewayError::TokenExpired)));
    assert!(f.gateway.transport().sent().is_empty());
}

// =========================================================================
// Response phase
// =========================================================================

#[tokio::test]
async fn test_unauthorized_clears_session_and_redirects_once() {
    let f = fixture(
        Some(token(NOW + 3600)),
        ScriptedTransport::answering([
            ApiResponse::new(StatusCode::UNAUTHORIZED, ""),
            ApiResponse::new(StatusCode::UNAUTHORIZED, ""),
        ]),
    );

    let first = f.gateway.get("/students").await;

    assert!(matches!(first, Err(GatewayError::Unauthorized)));
    assert!(f.storage.get(TOKEN_KEY).unwrap().is_none());
    assert!(f.storage.get(USER_KEY).unwrap().is_none());
    assert_eq!(f.navigator.current_path(), LOGIN_PATH);
    assert_eq!(f.manager.last_clear_reason(), Some(ClearReason::Rejected));

    // Already on /login: a second 401 must not navigate again.
    let second = f.gateway.get("/students").await;

    assert!(matches!(second, Err(GatewayError::Unauthorized)));
    assert_eq!(f.navigator.history(), vec!["/students", LOGIN_PATH]);
    assert_eq!(f.gateway.transport().sent()[1].bearer_token(), None);
}

#[tokio::test]
async fn test_forbidden_redirects_but_keeps_session() {
    let f = fixture(
        Some(token(NOW + 3600)),
        ScriptedTransport::answering([ApiResponse::new(StatusCode::FORBIDDEN, "")]),
    );

    let result = f.gateway.delete("/units/1").await;

    assert!(matches!(result, Err(GatewayError::Forbidden)));
    assert_eq!(f.navigator.current_path(), UNAUTHORIZED_PATH);
    assert!(f.manager.is_authenticated());
}

#[tokio::test]
async fn test_other_error_status_passes_through() {
    let f = fixture(
        Some(token(NOW + 3600)),
        ScriptedTransport::answering([ApiResponse::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"name is required"}"#,
        )]),
    );

    let err = f
        .gateway
        .post("/students", &serde_json::json!({ "name": "" }))
        .await
        .unwrap_err();

    let GatewayError::Status { status, body } = err else {
        panic!("expected Status, got {err:?}");
    };
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("name is required"));
    assert!(f.manager.is_authenticated());
    assert_eq!(f.navigator.history(), vec!["/students"]);
}

#[tokio::test]
async fn test_transport_failure_is_not_a_session_event() {
    let f = fixture(Some(token(NOW + 3600)), ScriptedTransport::default());

    let result = f.gateway.get("/students").await;

    assert!(matches!(
        result,
        Err(GatewayError::Transport(TransportError::Connection(_)))
    ));
    assert!(f.manager.is_authenticated());
}

// =========================================================================
// Verbs and bodies
// =========================================================================

#[tokio::test]
async fn test_put_and_patch_carry_json_body() {
    let f = fixture(
        Some(token(NOW + 3600)),
        ScriptedTransport::answering([ok(""), ok("")]),
    );
    let body = serde_json::json!({ "name": "Ana" });

    f.gateway.put("/students/3", &body).await.unwrap();
    f.gateway.patch("/students/3", &body).await.unwrap();

    let sent = f.gateway.transport().sent();
    assert_eq!(sent[0].method, Method::PUT);
    assert_eq!(sent[1].method, Method::PATCH);
    assert_eq!(sent[1].body, Some(body));
}

#[tokio::test]
async fn test_get_json_decodes_body() {
    #[derive(serde::Deserialize)]
    struct Student {
        id: u32,
        name: String,
    }

    let f = fixture(
        Some(token(NOW + 3600)),
        ScriptedTransport::answering([ok(r#"[{"id":1,"name":"Ana"}]"#)]),
    );

    let students: Vec<Student> = f.gateway.get_json("/students").await.unwrap();

    assert_eq!(students.len(), 1);
    assert_eq!(students[0].id, 1);
    assert_eq!(students[0].name, "Ana");
}

// =========================================================================
// Login through the gateway
// =========================================================================

#[tokio::test]
async fn test_login_via_gateway_stores_session() {
    let issued = token(NOW + 3600);
    let f = fixture(
        None,
        ScriptedTransport::answering([ok(&format!("\"{issued}\""))]),
    );

    let outcome = f
        .manager
        .login(&f.gateway, "alice", "secret")
        .await
        .unwrap();

    assert_eq!(outcome.token, issued);
    assert!(f.manager.is_teacher());
    let sent = f.gateway.transport().sent();
    assert_eq!(sent[0].method, Method::POST);
    assert_eq!(sent[0].path, LOGIN_ENDPOINT);
    assert_eq!(
        sent[0].body,
        Some(serde_json::json!({ "username": "alice", "password": "secret" }))
    );
}

#[tokio::test]
async fn test_login_via_gateway_rejected_credentials() {
    let f = fixture(
        None,
        ScriptedTransport::answering([ApiResponse::new(StatusCode::UNAUTHORIZED, "")]),
    );
    f.navigator.navigate(LOGIN_PATH);

    let result = f.manager.login(&f.gateway, "alice", "wrong").await;

    assert!(result.is_err());
    assert!(!f.manager.is_authenticated());
    assert_eq!(f.navigator.history(), vec!["/students", LOGIN_PATH]);
}

#[tokio::test]
async fn test_login_via_gateway_ignores_stale_expired_token() {
    let issued = token(NOW + 3600);
    let f = fixture(
        Some(token(NOW - 60)),
        ScriptedTransport::answering([ok(&issued)]),
    );
    f.navigator.navigate(LOGIN_PATH);

    let outcome = f
        .manager
        .login(&f.gateway, "alice", "secret")
        .await
        .unwrap();

    assert_eq!(outcome.token, issued);
    assert!(f.manager.is_authenticated());
    let sent = f.gateway.transport().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bearer_token(), None);
}

// =========================================================================
// Route guard
// =========================================================================

#[test]
fn test_guard_without_session_redirects_to_login() {
    let f = fixture(None, ScriptedTransport::default());

    let access = f.gateway.guard(None);

    assert_eq!(
        access,
        Access::Login {
            from: "/students".into()
        }
    );
    assert_eq!(f.navigator.current_path(), LOGIN_PATH);
}

#[test]
fn test_guard_expired_session_redirects_to_login() {
    let f = fixture(Some(token(NOW - 1)), ScriptedTransport::default());

    assert!(matches!(f.gateway.guard(None), Access::Login { .. }));
    assert_eq!(f.navigator.current_path(), LOGIN_PATH);
}

#[test]
fn test_guard_wrong_role_redirects_to_unauthorized() {
    let f = fixture(Some(token(NOW + 3600)), ScriptedTransport::default());

    let access = f.gateway.guard(Some(Role::Admin));

    assert_eq!(access, Access::Forbidden);
    assert_eq!(f.navigator.current_path(), UNAUTHORIZED_PATH);
    assert!(f.manager.is_authenticated(), "session must survive");
}

#[test]
fn test_guard_matching_role_grants_without_moving() {
    let f = fixture(Some(token(NOW + 3600)), ScriptedTransport::default());

    let access = f.gateway.guard(Some(Role::Teacher));

    match access {
        Access::Granted(principal) => assert_eq!(principal.username, "alice"),
        other => panic!("expected access, got {other:?}"),
    }
    assert_eq!(f.navigator.history(), vec!["/students"]);
}

#[test]
fn test_guard_no_role_required_grants_any_session() {
    let f = fixture(Some(token(NOW + 3600)), ScriptedTransport::default());

    assert!(f.gateway.guard(None).is_granted());
}
