//! Integration tests for the realty portal engine.
//!
//! [`FakeAuthority`] is an in-process stand-in for the marketplace REST API:
//! an `axum` router over shared in-memory state, served on an ephemeral
//! local port. Tests seed users and entity lists, drive the engine through
//! [`realty_client::Portal`], and inspect what the authority saw.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p realty-integration-tests
//! ```
//!
//! # Failure injection
//!
//! - [`FakeAuthority::fail`] answers every request to a path with a fixed
//!   status and message
//! - [`FakeAuthority::delay`] holds requests to a path before answering,
//!   so a test can log out while a refresh is in flight
//! - [`FakeAuthority::revoke_tokens`] makes every issued token answer 401

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use realty_client::{ClientConfig, MemoryStorage, Portal, SessionStorage};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// Paths served by the authority.
pub mod paths {
    pub const AGENTS: &str = "/agents";
    pub const PENDING_INDIVIDUAL_AGENTS: &str = "/admin/agents/pending-approval/individual";
    pub const PENDING_COMPANY_AGENTS: &str = "/admin/agents/pending-approval/from-company";
    pub const COMPANIES: &str = "/companies";
    pub const PENDING_COMPANIES: &str = "/admin/dashboard/pending-approvals/companies";
    pub const PENDING_PROPERTIES: &str = "/properties/pending-verification";
    pub const PUBLIC_PROPERTIES: &str = "/public/properties";
    pub const PROJECTS: &str = "/properties/projects/view";
    pub const PENDING_PROJECTS: &str = "/properties/projects/pending";
    pub const LOGIN: &str = "/auth/login";
    pub const LOGOUT: &str = "/auth/logout";
}

/// How a list endpoint wraps its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    /// `{"content": [...], "totalElements": n}`
    #[default]
    Paginated,
    /// `{"data": [...]}`
    Wrapped,
    /// `[...]`
    Raw,
}

/// One request as the authority received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// Parse the body as JSON (`Null` if it is not).
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

struct SeedUser {
    password: String,
    profile: Value,
}

#[derive(Default)]
struct AuthorityState {
    users: HashMap<String, SeedUser>,
    tokens: HashMap<String, String>,
    issued: u64,
    lists: HashMap<String, Vec<Value>>,
    shapes: HashMap<String, Shape>,
    documents: HashMap<i64, Vec<Value>>,
    failures: HashMap<String, (StatusCode, String)>,
    delays: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<AuthorityState>>;

/// Mount point of the API, kept in the base URL the client is given.
const API_PREFIX: &str = "/api";

fn lock(state: &Shared) -> MutexGuard<'_, AuthorityState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queues touched by decisions on one entity family.
struct Family {
    pending: &'static [&'static str],
    all: &'static str,
    /// Whether a rejection also lands in `all`.
    keeps_rejected: bool,
}

const AGENT_FAMILY: Family = Family {
    pending: &[paths::PENDING_INDIVIDUAL_AGENTS, paths::PENDING_COMPANY_AGENTS],
    all: paths::AGENTS,
    keeps_rejected: true,
};
const COMPANY_FAMILY: Family = Family {
    pending: &[paths::PENDING_COMPANIES],
    all: paths::COMPANIES,
    keeps_rejected: true,
};
const PROPERTY_FAMILY: Family = Family {
    pending: &[paths::PENDING_PROPERTIES],
    all: paths::PUBLIC_PROPERTIES,
    keeps_rejected: false,
};
const PROJECT_FAMILY: Family = Family {
    pending: &[paths::PENDING_PROJECTS],
    all: paths::PROJECTS,
    keeps_rejected: false,
};

fn item_id(item: &Value) -> Option<i64> {
    match item.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, axum::Json(json!({ "message": text }))).into_response()
}

impl AuthorityState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| self.tokens.contains_key(token))
    }

    fn list_response(&self, path: &str) -> Response {
        let items = self.lists.get(path).cloned().unwrap_or_default();
        let body = match self.shapes.get(path).copied().unwrap_or_default() {
            Shape::Paginated => json!({ "content": items, "totalElements": items.len() }),
            Shape::Wrapped => json!({ "data": items }),
            Shape::Raw => Value::Array(items),
        };
        axum::Json(body).into_response()
    }

    fn decide(&mut self, family: &Family, id: i64, approve: bool) -> Response {
        let mut found = None;
        for path in family.pending {
            if let Some(list) = self.lists.get_mut(*path)
                && let Some(index) = list.iter().position(|item| item_id(item) == Some(id))
            {
                let item = list.remove(index);
                found.get_or_insert(item);
            }
        }

        let Some(mut item) = found else {
            let known = self
                .lists
                .get(family.all)
                .is_some_and(|list| list.iter().any(|item| item_id(item) == Some(id)));
            return if known {
                message(StatusCode::CONFLICT, &format!("{id} is not pending"))
            } else {
                message(StatusCode::NOT_FOUND, &format!("{id} not found"))
            };
        };

        let status = if approve { "APPROVED" } else { "REJECTED" };
        if let Value::Object(map) = &mut item {
            map.insert("verificationStatus".to_string(), json!(status));
            map.remove("status");
        }
        if approve || family.keeps_rejected {
            let list = self.lists.entry(family.all.to_string()).or_default();
            list.retain(|existing| item_id(existing) != Some(id));
            list.push(item);
        }
        axum::Json(json!({ "id": id, "verificationStatus": status })).into_response()
    }
}

/// In-process fake of the marketplace REST API.
pub struct FakeAuthority {
    base_url: String,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeAuthority {
    /// Start serving on an ephemeral local port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Shared::default();
        let auth = Router::new()
            .route(paths::LOGIN, post(login))
            .route(paths::LOGOUT, post(logout))
            .route("/auth/forgot-password", post(accept_auth))
            .route("/auth/reset-password", post(accept_auth));
        let app = Router::new()
            .nest(API_PREFIX, auth)
            .fallback(dispatch)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake authority");
        let addr = listener.local_addr().expect("Fake authority has no address");
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Fake authority stopped: {e}");
            }
        });

        Self {
            base_url: format!("http://{addr}{API_PREFIX}"),
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Client configuration pointing at this authority.
    ///
    /// # Panics
    ///
    /// Never in practice: the base URL is always a valid http URL.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url).expect("Fake authority URL is valid")
    }

    /// A portal over fresh in-memory storage, plus that storage.
    ///
    /// # Panics
    ///
    /// Panics if the portal cannot be built.
    pub async fn portal(&self) -> (Portal, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let portal = self.portal_with(storage.clone()).await;
        (portal, storage)
    }

    /// A portal over existing storage.
    ///
    /// # Panics
    ///
    /// Panics if the portal cannot be built.
    pub async fn portal_with(&self, storage: Arc<dyn SessionStorage>) -> Portal {
        Portal::new(self.config(), storage)
            .await
            .expect("Failed to build portal")
    }

    /// Register an account. `profile` is returned as the login `user`.
    pub fn add_user(&self, identifier: &str, password: &str, profile: Value) {
        lock(&self.state).users.insert(
            identifier.to_string(),
            SeedUser {
                password: password.to_string(),
                profile,
            },
        );
    }

    /// Replace the items served at `path`.
    pub fn seed(&self, path: &str, items: Vec<Value>) {
        lock(&self.state).lists.insert(path.to_string(), items);
    }

    /// Serve an empty list at every queue endpoint.
    pub fn seed_empty_queues(&self) {
        let mut state = lock(&self.state);
        for path in [
            paths::AGENTS,
            paths::PENDING_INDIVIDUAL_AGENTS,
            paths::PENDING_COMPANY_AGENTS,
            paths::COMPANIES,
            paths::PENDING_COMPANIES,
            paths::PENDING_PROPERTIES,
            paths::PUBLIC_PROPERTIES,
            paths::PROJECTS,
            paths::PENDING_PROJECTS,
        ] {
            state.lists.entry(path.to_string()).or_default();
        }
    }

    pub fn set_shape(&self, path: &str, shape: Shape) {
        lock(&self.state).shapes.insert(path.to_string(), shape);
    }

    /// Documents served for agent `id`.
    pub fn seed_documents(&self, id: i64, documents: Vec<Value>) {
        lock(&self.state).documents.insert(id, documents);
    }

    /// Answer every request to `path` with `status` and `text`.
    pub fn fail(&self, path: &str, status: u16, text: &str) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        lock(&self.state)
            .failures
            .insert(path.to_string(), (status, text.to_string()));
    }

    pub fn clear_failure(&self, path: &str) {
        lock(&self.state).failures.remove(path);
    }

    /// Hold requests to `path` for `delay` before answering.
    pub fn delay(&self, path: &str, delay: Duration) {
        lock(&self.state).delays.insert(path.to_string(), delay);
    }

    /// Invalidate every token issued so far.
    pub fn revoke_tokens(&self) {
        lock(&self.state).tokens.clear();
    }

    /// Items currently served at `path`.
    #[must_use]
    pub fn list(&self, path: &str) -> Vec<Value> {
        lock(&self.state).lists.get(path).cloned().unwrap_or_default()
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests received for `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

impl Drop for FakeAuthority {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// List item with an id and an optional status.
#[must_use]
pub fn entity(id: i64, status: Option<&str>) -> Value {
    match status {
        Some(status) => json!({ "id": id, "name": format!("entity {id}"), "status": status }),
        None => json!({ "id": id, "name": format!("entity {id}") }),
    }
}

/// Login profile for a principal with `role_type`.
#[must_use]
pub fn profile(id: i64, email: &str, role_type: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "firstName": "Test",
        "lastName": format!("User{id}"),
        "roleType": role_type,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Path below the `/api` prefix.
fn api_path(uri: &Uri) -> String {
    let path = uri.path();
    path.strip_prefix(API_PREFIX).unwrap_or(path).to_string()
}

/// Record the request, apply any delay, then any forced failure.
async fn gate(
    state: &Shared,
    method: &Method,
    path: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<(), Response> {
    let delay = {
        let mut guard = lock(state);
        guard.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.to_string(),
            query: query.clone(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        guard.delays.get(path).copied()
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    match lock(state).failures.get(path) {
        Some((status, text)) => Err(message(*status, text)),
        None => Ok(()),
    }
}

async fn login(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = api_path(&uri);
    if let Err(response) = gate(&state, &method, &path, &HashMap::new(), &headers, &body).await {
        return response;
    }

    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        return message(StatusCode::BAD_REQUEST, "Malformed login request");
    };
    let identifier = request.get("identifier").and_then(Value::as_str).unwrap_or_default();
    let password = request.get("password").and_then(Value::as_str).unwrap_or_default();

    let mut guard = lock(&state);
    let profile = match guard.users.get(identifier) {
        Some(user) if user.password == password => user.profile.clone(),
        _ => return message(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    };
    guard.issued += 1;
    let token = format!("token-{}", guard.issued);
    guard.tokens.insert(token.clone(), identifier.to_string());

    axum::Json(json!({ "accessToken": token, "tokenType": "Bearer", "user": profile }))
        .into_response()
}

async fn logout(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = api_path(&uri);
    if let Err(response) = gate(&state, &method, &path, &HashMap::new(), &headers, &body).await {
        return response;
    }
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    if let Some(token) = token {
        lock(&state).tokens.remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn accept_auth(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = api_path(&uri);
    if let Err(response) = gate(&state, &method, &path, &query, &headers, &body).await {
        return response;
    }
    StatusCode::OK.into_response()
}

async fn dispatch(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = api_path(&uri);
    if let Err(response) = gate(&state, &method, &path, &query, &headers, &body).await {
        return response;
    }

    let mut guard = lock(&state);
    if !guard.authorized(&headers) {
        return message(StatusCode::UNAUTHORIZED, "Full authentication is required");
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (&method, segments.as_slice()) {
        (&Method::POST, ["admin", "agents", id, action]) => {
            decision(&mut guard, &AGENT_FAMILY, id, action)
        }
        (&Method::POST, ["companies", id, action]) => {
            decision(&mut guard, &COMPANY_FAMILY, id, action)
        }
        (&Method::POST, ["properties", "projects", "view", id, action]) => {
            decision(&mut guard, &PROJECT_FAMILY, id, action)
        }
        (&Method::POST, ["properties", id, action]) => {
            decision(&mut guard, &PROPERTY_FAMILY, id, action)
        }
        (&Method::POST, ["projects", id, "phases"]) => match parse_id(id) {
            Some(id) => (
                StatusCode::CREATED,
                axum::Json(json!({ "id": 1, "projectId": id })),
            )
                .into_response(),
            None => message(StatusCode::BAD_REQUEST, "Bad project id"),
        },
        (&Method::GET, ["documents", "entity", _owner, id]) => {
            let documents = parse_id(id)
                .and_then(|id| guard.documents.get(&id).cloned())
                .unwrap_or_default();
            axum::Json(json!({ "content": documents })).into_response()
        }
        (&Method::GET, ["companies", "statistics", which]) => {
            let companies = guard.lists.get(paths::COMPANIES).cloned().unwrap_or_default();
            let verified = companies
                .iter()
                .filter(|c| c.get("verificationStatus") == Some(&json!("APPROVED")))
                .count();
            let pending = guard
                .lists
                .get(paths::PENDING_COMPANIES)
                .map_or(0, Vec::len);
            match *which {
                "verified" => axum::Json(json!({ "count": verified })).into_response(),
                "pending" => axum::Json(json!(pending)).into_response(),
                _ => message(StatusCode::NOT_FOUND, "Unknown statistic"),
            }
        }
        (&Method::GET, _) if guard.lists.contains_key(&path) => guard.list_response(&path),
        _ => message(StatusCode::NOT_FOUND, "No such endpoint"),
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn decision(state: &mut AuthorityState, family: &Family, id: &str, action: &str) -> Response {
    let Some(id) = parse_id(id) else {
        return message(StatusCode::BAD_REQUEST, "Bad id");
    };
    match action {
        "approve" => state.decide(family, id, true),
        "reject" => state.decide(family, id, false),
        _ => message(StatusCode::NOT_FOUND, "No such action"),
    }
}
