//! Gateway Client Abstraction Layer
//!
//! This module provides a single interface to the gateway's management API
//! and the auth service, whichever transport backs it.
//!
//! # Implementations
//!
//! - **HttpGatewayApi**: talks to the real backend over HTTP (reqwest)
//! - **InMemoryGatewayApi**: an in-process gateway used by tests and demos
//!
//! Both implement [`GatewayApi`], attach the current session's bearer token
//! and route every 401 through [`SessionContext::handle_unauthorized`], so
//! callers never have to handle an expired session themselves.
//!
//! [`SessionContext::handle_unauthorized`]: crate::session::SessionContext::handle_unauthorized

mod http;
mod memory;

pub use http::HttpGatewayApi;
pub use memory::InMemoryGatewayApi;

use async_trait::async_trait;
use smsgate_shared::{
    Connector, ConnectorPatch, Direction, ErrorBody, Group, GroupPatch, LoginRequest,
    LoginResponse, NewConnector, NewGroup, NewRoute, NewUser, Route, RoutePatch, SystemStats,
    TrafficStats, User, UserPatch,
};

/// Error types for gateway client operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        ApiError::Http { status, body: body.into() }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Message shown to the operator for this failure
    ///
    /// 4xx bodies are surfaced verbatim, 5xx responses get a generic text.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Unable to reach the gateway. Check your connection and try again.".to_string()
            }
            ApiError::Timeout => "The gateway did not respond in time. Try again.".to_string(),
            ApiError::Http { status: 401, .. } => {
                "Your session has expired. Please log in again.".to_string()
            }
            ApiError::Http { status, body } if (400..500).contains(status) => {
                ErrorBody::message_from(body)
                    .unwrap_or_else(|| format!("Request failed with status {}", status))
            }
            ApiError::Http { .. } => {
                "The gateway failed to process the request. Try again later.".to_string()
            }
            ApiError::Decode(_) => "The gateway returned an unexpected response.".to_string(),
        }
    }
}

/// One function per backend operation
#[async_trait]
pub trait GatewayApi: Send + Sync {
    // -------------------------------------------------------------------------
    // Auth
    // -------------------------------------------------------------------------

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    /// Check a token with the auth service; `Ok` means it is still valid
    async fn validate_token(&self, token: &str) -> Result<(), ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    // -------------------------------------------------------------------------
    // Connectors
    // -------------------------------------------------------------------------

    async fn list_connectors(&self) -> Result<Vec<Connector>, ApiError>;

    async fn get_connector(&self, id: &str) -> Result<Connector, ApiError>;

    async fn create_connector(&self, payload: &NewConnector) -> Result<Connector, ApiError>;

    async fn update_connector(&self, id: &str, patch: &ConnectorPatch) -> Result<Connector, ApiError>;

    async fn delete_connector(&self, id: &str) -> Result<(), ApiError>;

    async fn start_connector(&self, id: &str) -> Result<(), ApiError>;

    async fn stop_connector(&self, id: &str) -> Result<(), ApiError>;

    // -------------------------------------------------------------------------
    // Routes
    // -------------------------------------------------------------------------

    async fn list_routes(&self, direction: Option<Direction>) -> Result<Vec<Route>, ApiError>;

    async fn create_route(&self, payload: &NewRoute) -> Result<Route, ApiError>;

    async fn update_route(&self, id: &str, patch: &RoutePatch) -> Result<Route, ApiError>;

    async fn delete_route(&self, id: &str) -> Result<(), ApiError>;

    /// Move a route to `order` within its direction; the gateway shifts the rest
    async fn reorder_route(&self, id: &str, order: u32) -> Result<(), ApiError>;

    // -------------------------------------------------------------------------
    // Users & Groups
    // -------------------------------------------------------------------------

    async fn list_users(&self) -> Result<Vec<User>, ApiError>;

    async fn create_user(&self, payload: &NewUser) -> Result<User, ApiError>;

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, ApiError>;

    async fn delete_user(&self, id: &str) -> Result<(), ApiError>;

    async fn list_groups(&self) -> Result<Vec<Group>, ApiError>;

    async fn create_group(&self, payload: &NewGroup) -> Result<Group, ApiError>;

    async fn update_group(&self, id: &str, patch: &GroupPatch) -> Result<Group, ApiError>;

    async fn delete_group(&self, id: &str) -> Result<(), ApiError>;

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    async fn system_stats(&self) -> Result<SystemStats, ApiError>;

    async fn smpp_stats(&self) -> Result<TrafficStats, ApiError>;

    async fn http_stats(&self) -> Result<TrafficStats, ApiError>;
}
