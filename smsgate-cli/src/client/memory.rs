//! In-process gateway
//!
//! Keeps connectors, routes, users and groups in memory and answers the
//! same operations as the real backend, including token checks. Tests use
//! the knobs (`fail_next`, `set_latency`, `revoke_all_tokens`) to drive the
//! failure paths.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{ApiError, GatewayApi};
use crate::session::SessionContext;
use smsgate_shared::{
    BindMode, Connector, ConnectorKind, ConnectorPatch, ConnectorStatus, ConnectorTraffic,
    Direction, Group, GroupPatch, LoginRequest, LoginResponse, NewConnector, NewGroup, NewRoute,
    NewUser, ReconnectPolicy, Route, RoutePatch, SessionUser, SmppSettings, SystemStats,
    TrafficStats, User, UserPatch,
};

const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

struct Account {
    password: String,
    user: SessionUser,
}

#[derive(Default)]
struct FakeState {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, SessionUser>,
    connectors: Vec<Connector>,
    routes: Vec<Route>,
    users: Vec<User>,
    groups: Vec<Group>,
    system: SystemStats,
    smpp: TrafficStats,
    http: TrafficStats,
    failures: VecDeque<ApiError>,
    latency: Option<Duration>,
}

/// Gateway held in memory
pub struct InMemoryGatewayApi {
    state: Mutex<FakeState>,
    session: SessionContext,
    timeout: Duration,
    token_ttl_secs: u64,
    requests: AtomicUsize,
}

fn error_body(message: &str) -> String {
    serde_json::json!({ "message": message }).to_string()
}

fn not_found(entity: &str, id: &str) -> ApiError {
    ApiError::http(404, error_body(&format!("{} {} not found", entity, id)))
}

impl InMemoryGatewayApi {
    pub fn new(session: SessionContext) -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            session,
            timeout: Duration::from_secs(5),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            requests: AtomicUsize::new(0),
        }
    }

    /// A gateway with an `admin`/`secret` account and a few resources
    pub fn demo(session: SessionContext) -> Self {
        let admin = SessionUser {
            id: "1".to_string(),
            username: "admin".to_string(),
            roles: vec!["admin".to_string()],
        };
        let smpp = |cid: &str, host: &str, status| Connector {
            id: cid.to_string(),
            cid: cid.to_string(),
            kind: ConnectorKind::Smpp(SmppSettings {
                host: host.to_string(),
                port: 2775,
                system_id: "smppclient".to_string(),
                password: None,
                system_type: String::new(),
                bind_mode: BindMode::Transceiver,
                address_range: String::new(),
                use_ssl: false,
            }),
            status,
            reconnect: ReconnectPolicy::default(),
        };
        let route = |id: &str, order, connector: &str| Route {
            id: id.to_string(),
            direction: Direction::Mt,
            order,
            route_type: Default::default(),
            connector_id: connector.to_string(),
            rate: None,
            filters: Vec::new(),
            status: Default::default(),
        };

        Self::new(session)
            .with_account("admin", "secret", admin)
            .with_connectors(vec![
                smpp("carrier1", "smsc1.example.net", ConnectorStatus::Connected),
                smpp("carrier2", "smsc2.example.net", ConnectorStatus::Disconnected),
            ])
            .with_routes(vec![
                route("r1", 0, "carrier1"),
                route("r2", 1, "carrier2"),
                route("r3", 2, "carrier1"),
            ])
            .with_system_stats(SystemStats {
                total_sent: 1200,
                total_delivered: 1150,
                total_failed: 50,
                delivery_rate: 95.8,
                messages_per_second: 3.5,
                active_connectors: 1,
                total_connectors: 2,
            })
            .with_smpp_stats(TrafficStats {
                connectors: vec![ConnectorTraffic {
                    cid: "carrier1".to_string(),
                    sent: 1200,
                    delivered: 1150,
                    failed: 50,
                    status: ConnectorStatus::Connected,
                }],
            })
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    fn seed(self, apply: impl FnOnce(&mut FakeState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            apply(&mut state);
        }
        self
    }

    pub fn with_account(self, username: &str, password: &str, user: SessionUser) -> Self {
        let username = username.to_string();
        let password = password.to_string();
        self.seed(|s| {
            s.accounts.insert(username, Account { password, user });
        })
    }

    pub fn with_connectors(self, connectors: Vec<Connector>) -> Self {
        self.seed(|s| s.connectors = connectors)
    }

    pub fn with_routes(self, routes: Vec<Route>) -> Self {
        self.seed(|s| s.routes = routes)
    }

    pub fn with_users(self, users: Vec<User>) -> Self {
        self.seed(|s| s.users = users)
    }

    pub fn with_groups(self, groups: Vec<Group>) -> Self {
        self.seed(|s| s.groups = groups)
    }

    pub fn with_system_stats(self, stats: SystemStats) -> Self {
        self.seed(|s| s.system = stats)
    }

    pub fn with_smpp_stats(self, stats: TrafficStats) -> Self {
        self.seed(|s| s.smpp = stats)
    }

    pub fn with_http_stats(self, stats: TrafficStats) -> Self {
        self.seed(|s| s.http = stats)
    }

    /// Requests slower than this fail with [`ApiError::Timeout`]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_ttl(mut self, secs: u64) -> Self {
        self.token_ttl_secs = secs;
        self
    }

    // -------------------------------------------------------------------------
    // Test knobs
    // -------------------------------------------------------------------------

    /// Fail the next request with `error` (queued, one per request)
    pub fn fail_next(&self, error: ApiError) {
        self.with_state(|s| s.failures.push_back(error));
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        self.with_state(|s| s.latency = latency);
    }

    /// Register a token as if the user had logged in elsewhere
    pub fn issue_token(&self, user: &SessionUser) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let user = user.clone();
        let issued = token.clone();
        self.with_state(move |s| {
            s.tokens.insert(issued, user);
        });
        token
    }

    pub fn revoke_all_tokens(&self) {
        self.with_state(|s| s.tokens.clear());
    }

    /// Requests received so far, failed ones included
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn connectors(&self) -> Vec<Connector> {
        self.with_state(|s| s.connectors.clone())
    }

    pub fn routes(&self) -> Vec<Route> {
        self.with_state(|s| s.routes.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    /// Common request prologue: count, delay, injected failure, token check
    async fn begin(&self, authenticated: bool) -> Result<(), ApiError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let (latency, failure) = self.with_state(|s| (s.latency, s.failures.pop_front()));
        if let Some(latency) = latency {
            if latency >= self.timeout {
                tokio::time::sleep(self.timeout).await;
                return Err(ApiError::Timeout);
            }
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = failure {
            return self.reject(error).await;
        }

        if authenticated {
            let token = self.session.token().await;
            let valid = match &token {
                Some(token) => self.with_state(|s| s.tokens.contains_key(token)),
                None => false,
            };
            if !valid {
                return self.reject(ApiError::http(401, error_body("Unauthorized"))).await;
            }
        }
        Ok(())
    }

    async fn reject<T>(&self, error: ApiError) -> Result<T, ApiError> {
        if error.is_unauthorized() {
            self.session.handle_unauthorized().await;
        }
        debug!("In-memory gateway rejecting request: {}", error);
        Err(error)
    }
}

/// Dense 0..n-1 ranks for one direction, keeping the current relative order
fn renumber(routes: &mut [Route], direction: Direction) {
    let mut ranked: Vec<&mut Route> = routes.iter_mut().filter(|r| r.direction == direction).collect();
    ranked.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    for (index, route) in ranked.into_iter().enumerate() {
        route.order = index as u32;
    }
}

#[async_trait]
impl GatewayApi for InMemoryGatewayApi {
    // -------------------------------------------------------------------------
    // Auth
    // -------------------------------------------------------------------------

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.begin(false).await?;
        let user = self.with_state(|s| {
            s.accounts
                .get(&request.username)
                .filter(|account| account.password == request.password)
                .map(|account| account.user.clone())
        });
        match user {
            Some(user) => Ok(LoginResponse {
                token: self.issue_token(&user),
                user,
                expires_in: self.token_ttl_secs,
            }),
            None => self.reject(ApiError::http(401, error_body("Invalid credentials"))).await,
        }
    }

    async fn validate_token(&self, token: &str) -> Result<(), ApiError> {
        self.begin(false).await?;
        if self.with_state(|s| s.tokens.contains_key(token)) {
            Ok(())
        } else {
            self.reject(ApiError::http(401, error_body("Invalid token"))).await
        }
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.begin(false).await?;
        if let Some(token) = self.session.token().await {
            self.with_state(|s| s.tokens.remove(&token));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Connectors
    // -------------------------------------------------------------------------

    async fn list_connectors(&self) -> Result<Vec<Connector>, ApiError> {
        self.begin(true).await?;
        Ok(self.with_state(|s| s.connectors.clone()))
    }

    async fn get_connector(&self, id: &str) -> Result<Connector, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| s.connectors.iter().find(|c| c.id == id).cloned())
            .ok_or_else(|| not_found("Connector", id))
    }

    async fn create_connector(&self, payload: &NewConnector) -> Result<Connector, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            if s.connectors.iter().any(|c| c.cid == payload.cid) {
                return Err(ApiError::http(
                    409,
                    error_body(&format!("Connector {} already exists", payload.cid)),
                ));
            }
            let mut kind = payload.kind.clone();
            if let ConnectorKind::Smpp(smpp) = &mut kind {
                smpp.password = None;
            }
            let connector = Connector {
                id: payload.cid.clone(),
                cid: payload.cid.clone(),
                kind,
                status: ConnectorStatus::Disconnected,
                reconnect: payload.reconnect.clone(),
            };
            s.connectors.push(connector.clone());
            Ok(connector)
        })
    }

    async fn update_connector(&self, id: &str, patch: &ConnectorPatch) -> Result<Connector, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let connector = s
                .connectors
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| not_found("Connector", id))?;
            if let Some(kind) = &patch.settings {
                connector.kind = kind.clone();
            }
            if let Some(reconnect) = &patch.reconnect {
                connector.reconnect = reconnect.clone();
            }
            Ok(connector.clone())
        })
    }

    async fn delete_connector(&self, id: &str) -> Result<(), ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let before = s.connectors.len();
            s.connectors.retain(|c| c.id != id);
            if s.connectors.len() == before {
                Err(not_found("Connector", id))
            } else {
                Ok(())
            }
        })
    }

    async fn start_connector(&self, id: &str) -> Result<(), ApiError> {
        self.begin(true).await?;
        self.with_state(|s| match s.connectors.iter_mut().find(|c| c.id == id) {
            Some(connector) => {
                connector.status = ConnectorStatus::Connected;
                Ok(())
            }
            None => Err(not_found("Connector", id)),
        })
    }

    async fn stop_connector(&self, id: &str) -> Result<(), ApiError> {
        self.begin(true).await?;
        self.with_state(|s| match s.connectors.iter_mut().find(|c| c.id == id) {
            Some(connector) => {
                connector.status = ConnectorStatus::Disconnected;
                Ok(())
            }
            None => Err(not_found("Connector", id)),
        })
    }

    // -------------------------------------------------------------------------
    // Routes
    // -------------------------------------------------------------------------

    async fn list_routes(&self, direction: Option<Direction>) -> Result<Vec<Route>, ApiError> {
        self.begin(true).await?;
        let mut routes: Vec<Route> = self.with_state(|s| {
            s.routes
                .iter()
                .filter(|r| direction.map_or(true, |d| r.direction == d))
                .cloned()
                .collect()
        });
        routes.sort_by(|a, b| (a.direction, a.order).cmp(&(b.direction, b.order)));
        Ok(routes)
    }

    async fn create_route(&self, payload: &NewRoute) -> Result<Route, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let order = s.routes.iter().filter(|r| r.direction == payload.direction).count() as u32;
            let route = Route {
                id: uuid::Uuid::new_v4().to_string(),
                direction: payload.direction,
                order,
                route_type: payload.route_type,
                connector_id: payload.connector_id.clone(),
                rate: payload.rate,
                filters: payload.filters.clone(),
                status: payload.status,
            };
            s.routes.push(route.clone());
            Ok(route)
        })
    }

    async fn update_route(&self, id: &str, patch: &RoutePatch) -> Result<Route, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let route = s
                .routes
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| not_found("Route", id))?;
            if let Some(route_type) = patch.route_type {
                route.route_type = route_type;
            }
            if let Some(connector_id) = &patch.connector_id {
                route.connector_id = connector_id.clone();
            }
            if patch.rate.is_some() {
                route.rate = patch.rate;
            }
            if let Some(filters) = &patch.filters {
                route.filters = filters.clone();
            }
            if let Some(status) = patch.status {
                route.status = status;
            }
            Ok(route.clone())
        })
    }

    async fn delete_route(&self, id: &str) -> Result<(), ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let direction = s
                .routes
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.direction)
                .ok_or_else(|| not_found("Route", id))?;
            s.routes.retain(|r| r.id != id);
            renumber(&mut s.routes, direction);
            Ok(())
        })
    }

    async fn reorder_route(&self, id: &str, order: u32) -> Result<(), ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let direction = s
                .routes
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.direction)
                .ok_or_else(|| not_found("Route", id))?;

            renumber(&mut s.routes, direction);
            let mut ids: Vec<(u32, String)> = s
                .routes
                .iter()
                .filter(|r| r.direction == direction)
                .map(|r| (r.order, r.id.clone()))
                .collect();
            ids.sort();
            let mut ids: Vec<String> = ids.into_iter().map(|(_, id)| id).collect();

            let from = ids.iter().position(|r| r == id).unwrap_or(0);
            let moved = ids.remove(from);
            let to = (order as usize).min(ids.len());
            ids.insert(to, moved);

            for route in s.routes.iter_mut().filter(|r| r.direction == direction) {
                if let Some(position) = ids.iter().position(|r| *r == route.id) {
                    route.order = position as u32;
                }
            }
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Users & Groups
    // -------------------------------------------------------------------------

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.begin(true).await?;
        Ok(self.with_state(|s| s.users.clone()))
    }

    async fn create_user(&self, payload: &NewUser) -> Result<User, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            if s.users.iter().any(|u| u.username == payload.username) {
                return Err(ApiError::http(
                    409,
                    error_body(&format!("Username {} is already taken", payload.username)),
                ));
            }
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                username: payload.username.clone(),
                email: payload.email.clone(),
                first_name: payload.first_name.clone(),
                last_name: payload.last_name.clone(),
                roles: payload.roles.clone(),
                group_ids: payload.group_ids.clone(),
                is_active: payload.is_active,
            };
            s.users.push(user.clone());
            Ok(user)
        })
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let user = s
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| not_found("User", id))?;
            if let Some(email) = &patch.email {
                user.email = email.clone();
            }
            if patch.first_name.is_some() {
                user.first_name = patch.first_name.clone();
            }
            if patch.last_name.is_some() {
                user.last_name = patch.last_name.clone();
            }
            if let Some(roles) = &patch.roles {
                user.roles = roles.clone();
            }
            if let Some(group_ids) = &patch.group_ids {
                user.group_ids = group_ids.clone();
            }
            if let Some(is_active) = patch.is_active {
                user.is_active = is_active;
            }
            Ok(user.clone())
        })
    }

    async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let before = s.users.len();
            s.users.retain(|u| u.id != id);
            if s.users.len() == before { Err(not_found("User", id)) } else { Ok(()) }
        })
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ApiError> {
        self.begin(true).await?;
        Ok(self.with_state(|s| s.groups.clone()))
    }

    async fn create_group(&self, payload: &NewGroup) -> Result<Group, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let group = Group {
                id: uuid::Uuid::new_v4().to_string(),
                name: payload.name.clone(),
                description: payload.description.clone(),
                member_count: 0,
                permissions: payload.permissions.clone(),
            };
            s.groups.push(group.clone());
            Ok(group)
        })
    }

    async fn update_group(&self, id: &str, patch: &GroupPatch) -> Result<Group, ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let group = s
                .groups
                .iter_mut()
                .find(|g| g.id == id)
                .ok_or_else(|| not_found("Group", id))?;
            if let Some(name) = &patch.name {
                group.name = name.clone();
            }
            if patch.description.is_some() {
                group.description = patch.description.clone();
            }
            if let Some(permissions) = &patch.permissions {
                group.permissions = permissions.clone();
            }
            Ok(group.clone())
        })
    }

    async fn delete_group(&self, id: &str) -> Result<(), ApiError> {
        self.begin(true).await?;
        self.with_state(|s| {
            let before = s.groups.len();
            s.groups.retain(|g| g.id != id);
            if s.groups.len() == before { Err(not_found("Group", id)) } else { Ok(()) }
        })
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    async fn system_stats(&self) -> Result<SystemStats, ApiError> {
        self.begin(true).await?;
        Ok(self.with_state(|s| s.system.clone()))
    }

    async fn smpp_stats(&self) -> Result<TrafficStats, ApiError> {
        self.begin(true).await?;
        Ok(self.with_state(|s| s.smpp.clone()))
    }

    async fn http_stats(&self) -> Result<TrafficStats, ApiError> {
        self.begin(true).await?;
        Ok(self.with_state(|s| s.http.clone()))
    }
}
