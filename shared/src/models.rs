//! Gateway resource records
//!
//! These types mirror the resources exposed by the gateway's management
//! API. They are plain data: the console never evaluates routes or binds
//! connectors itself, it only renders and edits what the gateway reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A record that can be held in an entity list, keyed by its id
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

// =============================================================================
// Connectors
// =============================================================================

/// Connector bind status as reported by the gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Connected,
    Disconnected,
    Binding,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorStatus::Connected => write!(f, "connected"),
            ConnectorStatus::Disconnected => write!(f, "disconnected"),
            ConnectorStatus::Binding => write!(f, "binding"),
            ConnectorStatus::Error => write!(f, "error"),
            ConnectorStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// SMPP session role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Transmitter,
    Receiver,
    #[default]
    Transceiver,
}

impl fmt::Display for BindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindMode::Transmitter => write!(f, "transmitter"),
            BindMode::Receiver => write!(f, "receiver"),
            BindMode::Transceiver => write!(f, "transceiver"),
        }
    }
}

impl std::str::FromStr for BindMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transmitter" | "tx" => Ok(BindMode::Transmitter),
            "receiver" | "rx" => Ok(BindMode::Receiver),
            "transceiver" | "trx" => Ok(BindMode::Transceiver),
            _ => Err(format!("Unknown bind mode: {}", s)),
        }
    }
}

/// HTTP method used by an HTTP connector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            _ => Err(format!("Unknown HTTP method: {}", s)),
        }
    }
}

/// Settings of an SMPP client connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmppSettings {
    pub host: String,
    pub port: u16,
    pub system_id: String,
    /// Never echoed back by the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub system_type: String,
    #[serde(default)]
    pub bind_mode: BindMode,
    #[serde(default)]
    pub address_range: String,
    #[serde(default)]
    pub use_ssl: bool,
}

/// Settings of an HTTP client connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSettings {
    pub base_url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_http_timeout() -> u32 { 30 }

/// Connector transport, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectorKind {
    Smpp(SmppSettings),
    Http(HttpSettings),
}

impl ConnectorKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConnectorKind::Smpp(_) => "smpp",
            ConnectorKind::Http(_) => "http",
        }
    }

    /// `host:port` for SMPP, the base URL for HTTP
    pub fn endpoint(&self) -> String {
        match self {
            ConnectorKind::Smpp(smpp) => format!("{}:{}", smpp.host, smpp.port),
            ConnectorKind::Http(http) => http.base_url.clone(),
        }
    }
}

/// Reconnection behaviour applied by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    pub connection_timeout_secs: u32,
    pub reconnect_on_connection_failure: bool,
    pub reconnect_on_connection_loss: bool,
    pub reconnect_interval_secs: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 30,
            reconnect_on_connection_failure: true,
            reconnect_on_connection_loss: true,
            reconnect_interval_secs: 10.0,
        }
    }
}

/// A configured link to a carrier (SMPP bind) or an HTTP endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: String,
    /// Connector id as known by the gateway
    pub cid: String,
    #[serde(flatten)]
    pub kind: ConnectorKind,
    #[serde(default)]
    pub status: ConnectorStatus,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl Entity for Connector {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Number of connectors per status, as shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub counts: BTreeMap<ConnectorStatus, usize>,
}

impl StatusSummary {
    pub fn from_connectors<'a>(connectors: impl IntoIterator<Item = &'a Connector>) -> Self {
        let mut summary = Self::default();
        for connector in connectors {
            summary.total += 1;
            *summary.counts.entry(connector.status).or_insert(0) += 1;
        }
        summary
    }

    pub fn count(&self, status: ConnectorStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

// =============================================================================
// Routes
// =============================================================================

/// Traffic direction a route applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Mobile-originated: inbound messages from handsets
    Mo,
    /// Mobile-terminated: outbound messages to handsets
    Mt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Mo => write!(f, "mo"),
            Direction::Mt => write!(f, "mt"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mo" => Ok(Direction::Mo),
            "mt" => Ok(Direction::Mt),
            _ => Err(format!("Unknown route direction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    #[default]
    Default,
    Static,
    Random,
    Failover,
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteType::Default => write!(f, "default"),
            RouteType::Static => write!(f, "static"),
            RouteType::Random => write!(f, "random"),
            RouteType::Failover => write!(f, "failover"),
        }
    }
}

impl std::str::FromStr for RouteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(RouteType::Default),
            "static" => Ok(RouteType::Static),
            "random" => Ok(RouteType::Random),
            "failover" => Ok(RouteType::Failover),
            _ => Err(format!("Unknown route type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Active,
    Disabled,
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteStatus::Active => write!(f, "active"),
            RouteStatus::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    SourceAddress,
    DestinationAddress,
    ShortMessage,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    StartsWith,
    EndsWith,
    Contains,
    Regex,
}

/// One match condition of a route; all filters of a route must match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFilter {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub operator: FilterOperator,
    pub value: String,
}

/// A routing rule
///
/// `order` is a dense rank among routes of the same direction; the gateway
/// evaluates routes in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub direction: Direction,
    pub order: u32,
    #[serde(default)]
    pub route_type: RouteType,
    pub connector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default)]
    pub filters: Vec<RouteFilter>,
    #[serde(default)]
    pub status: RouteStatus,
}

impl Entity for Route {
    fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Users & Groups
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub group_ids: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool { true }

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Action a group may perform on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupAction {
    View,
    Create,
    Update,
    Delete,
}

impl fmt::Display for GroupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupAction::View => write!(f, "view"),
            GroupAction::Create => write!(f, "create"),
            GroupAction::Update => write!(f, "update"),
            GroupAction::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for GroupAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" | "read" => Ok(GroupAction::View),
            "create" => Ok(GroupAction::Create),
            "update" | "write" => Ok(GroupAction::Update),
            "delete" => Ok(GroupAction::Delete),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

/// Resource name → allowed actions
pub type PermissionMap = BTreeMap<String, BTreeSet<GroupAction>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub permissions: PermissionMap,
}

impl Group {
    pub fn allows(&self, resource: &str, action: GroupAction) -> bool {
        self.permissions
            .get(resource)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// `resource: a, b | resource: c`, skipping resources without actions
    pub fn format_permissions(&self) -> String {
        self.permissions
            .iter()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(resource, actions)| {
                let actions = actions
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", resource, actions)
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Entity for Group {
    fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// The authenticated principal, as returned by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl SessionUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// A live login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Gateway-wide message counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStats {
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub delivery_rate: f64,
    pub messages_per_second: f64,
    pub active_connectors: u32,
    pub total_connectors: u32,
}

/// Per-connector traffic counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorTraffic {
    pub cid: String,
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub status: ConnectorStatus,
}

/// Traffic of one connector family (SMPP or HTTP)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficStats {
    pub connectors: Vec<ConnectorTraffic>,
}

impl TrafficStats {
    pub fn total_sent(&self) -> u64 {
        self.connectors.iter().map(|c| c.sent).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn smpp_connector(id: &str, status: ConnectorStatus) -> Connector {
        Connector {
            id: id.to_string(),
            cid: id.to_string(),
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
            status,
            reconnect: ReconnectPolicy::default(),
        }
    }

    #[test]
    fn test_connector_wire_format() {
        let connector = smpp_connector("carrier1", ConnectorStatus::Connected);
        let json = serde_json::to_value(&connector).unwrap();

        assert_eq!(json["type"], "smpp");
        assert_eq!(json["host"], "smsc.example.net");
        assert_eq!(json["systemId"], "smppclient");
        assert_eq!(json["status"], "connected");
        assert!(json.get("password").is_none());

        let parsed: Connector = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, connector);
    }

    #[test]
    fn test_http_connector_defaults() {
        let json = serde_json::json!({
            "id": "api1",
            "cid": "api1",
            "type": "http",
            "baseUrl": "https://hooks.example.com/mo"
        });

        let connector: Connector = serde_json::from_value(json).unwrap();
        match &connector.kind {
            ConnectorKind::Http(http) => {
                assert_eq!(http.method, HttpMethod::Post);
                assert_eq!(http.timeout_secs, 30);
            }
            other => panic!("Wrong connector kind: {:?}", other),
        }
        assert_eq!(connector.status, ConnectorStatus::Unknown);
        assert_eq!(connector.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn test_unknown_status_tolerated() {
        let status: ConnectorStatus = serde_json::from_str("\"starting\"").unwrap();
        assert_eq!(status, ConnectorStatus::Unknown);
    }

    #[test]
    fn test_status_summary() {
        let connectors = vec![
            smpp_connector("a", ConnectorStatus::Connected),
            smpp_connector("b", ConnectorStatus::Connected),
            smpp_connector("c", ConnectorStatus::Error),
        ];

        let summary = StatusSummary::from_connectors(&connectors);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count(ConnectorStatus::Connected), 2);
        assert_eq!(summary.count(ConnectorStatus::Error), 1);
        assert_eq!(summary.count(ConnectorStatus::Binding), 0);
    }

    #[test]
    fn test_route_filter_wire_format() {
        let filter = RouteFilter {
            filter_type: FilterType::DestinationAddress,
            operator: FilterOperator::StartsWith,
            value: "+33".to_string(),
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["type"], "destination_address");
        assert_eq!(json["operator"], "starts_with");
    }

    #[test]
    fn test_group_permissions() {
        let mut permissions = PermissionMap::new();
        permissions.insert(
            "connectors".to_string(),
            [GroupAction::View, GroupAction::Update].into_iter().collect(),
        );
        permissions.insert("users".to_string(), BTreeSet::new());

        let group = Group {
            id: "2".to_string(),
            name: "Managers".to_string(),
            description: None,
            member_count: 5,
            permissions,
        };

        assert!(group.allows("connectors", GroupAction::View));
        assert!(!group.allows("connectors", GroupAction::Delete));
        assert!(!group.allows("routes", GroupAction::View));
        assert_eq!(group.format_permissions(), "connectors: view, update");
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            token: "t".to_string(),
            user: SessionUser {
                id: "1".to_string(),
                username: "admin".to_string(),
                roles: vec!["Admin".to_string()],
            },
            expires_at: now + Duration::seconds(60),
        };

        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::seconds(60)));
        assert!(session.user.has_role("admin"));
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("MT".parse::<Direction>().unwrap(), Direction::Mt);
        assert_eq!("mo".parse::<Direction>().unwrap(), Direction::Mo);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
