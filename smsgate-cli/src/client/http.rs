//! HTTP implementation of the gateway client

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ApiError, GatewayApi};
use crate::config::AdminConfig;
use crate::session::SessionContext;
use smsgate_shared::{
    Connector, ConnectorPatch, Direction, Group, GroupPatch, LoginRequest, LoginResponse,
    NewConnector, NewGroup, NewRoute, NewUser, ReorderRequest, Route, RoutePatch, SystemStats,
    TrafficStats, User, UserPatch,
};

/// Which backend base URL a request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Auth service and user/group management
    Api,
    /// Gateway management API (connectors, routes, stats)
    Gateway,
}

#[derive(Debug, Clone)]
struct GatewayEndpoint {
    base_url: String,
    credentials: Option<(String, String)>,
}

/// Gateway client over HTTP
pub struct HttpGatewayApi {
    client: Client,
    api_url: String,
    gateway: Option<GatewayEndpoint>,
    session: SessionContext,
}

impl HttpGatewayApi {
    pub fn new(config: &AdminConfig, session: SessionContext) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let gateway = config.gateway.as_ref().map(|gateway| GatewayEndpoint {
            base_url: gateway.url.trim_end_matches('/').to_string(),
            credentials: match (&gateway.username, &gateway.password) {
                (Some(username), Some(password)) => Some((username.clone(), password.clone())),
                _ => None,
            },
        });

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gateway,
            session,
        })
    }

    fn url(&self, target: Target, path: &str) -> String {
        let base = match (target, &self.gateway) {
            (Target::Gateway, Some(gateway)) => gateway.base_url.as_str(),
            _ => self.api_url.as_str(),
        };
        format!("{}{}", base, path)
    }

    async fn authorize(&self, target: Target, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        if let (Target::Gateway, Some(gateway)) = (target, &self.gateway) {
            if let Some((username, password)) = &gateway.credentials {
                return builder.basic_auth(username, Some(password));
            }
        }
        let token = match token {
            Some(token) => Some(token.to_string()),
            None => self.session.token().await,
        };
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and return the raw body of a 2xx response
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        target: Target,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<String, ApiError> {
        let url = self.url(target, path);
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let builder = self.authorize(target, builder, token).await;

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if status == StatusCode::UNAUTHORIZED {
            self.session.handle_unauthorized().await;
            return Err(ApiError::http(status.as_u16(), text));
        }
        if !status.is_success() {
            warn!("{} {} failed with {}", method, url, status);
            return Err(ApiError::http(status.as_u16(), text));
        }
        Ok(text)
    }

    async fn get<T: DeserializeOwned>(&self, target: Target, path: &str) -> Result<T, ApiError> {
        let text = self.send::<()>(Method::GET, target, path, None, None).await?;
        decode(&text)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        target: Target,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let text = self.send(Method::POST, target, path, Some(body), None).await?;
        decode(&text)
    }

    async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        target: Target,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let text = self.send(Method::PUT, target, path, Some(body), None).await?;
        decode(&text)
    }

    /// Request whose response body is ignored
    async fn call(&self, method: Method, target: Target, path: &str) -> Result<(), ApiError> {
        self.send::<()>(method, target, path, None, None).await.map(|_| ())
    }
}

fn transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(error.to_string())
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

fn path_with_id(collection: &str, id: &str) -> String {
    format!("/{}/{}", collection, urlencoding::encode(id))
}

#[async_trait]
impl GatewayApi for HttpGatewayApi {
    // -------------------------------------------------------------------------
    // Auth
    // -------------------------------------------------------------------------

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.post(Target::Api, "/auth/login", request).await
    }

    async fn validate_token(&self, token: &str) -> Result<(), ApiError> {
        self.send::<()>(Method::GET, Target::Api, "/auth/validate", None, Some(token))
            .await
            .map(|_| ())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.call(Method::POST, Target::Api, "/auth/logout").await
    }

    // -------------------------------------------------------------------------
    // Connectors
    // -------------------------------------------------------------------------

    async fn list_connectors(&self) -> Result<Vec<Connector>, ApiError> {
        self.get(Target::Gateway, "/connectors").await
    }

    async fn get_connector(&self, id: &str) -> Result<Connector, ApiError> {
        self.get(Target::Gateway, &path_with_id("connectors", id)).await
    }

    async fn create_connector(&self, payload: &NewConnector) -> Result<Connector, ApiError> {
        self.post(Target::Gateway, "/connectors", payload).await
    }

    async fn update_connector(&self, id: &str, patch: &ConnectorPatch) -> Result<Connector, ApiError> {
        self.put(Target::Gateway, &path_with_id("connectors", id), patch).await
    }

    async fn delete_connector(&self, id: &str) -> Result<(), ApiError> {
        self.call(Method::DELETE, Target::Gateway, &path_with_id("connectors", id)).await
    }

    async fn start_connector(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/start", path_with_id("connectors", id));
        self.call(Method::POST, Target::Gateway, &path).await
    }

    async fn stop_connector(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/stop", path_with_id("connectors", id));
        self.call(Method::POST, Target::Gateway, &path).await
    }

    // -------------------------------------------------------------------------
    // Routes
    // -------------------------------------------------------------------------

    async fn list_routes(&self, direction: Option<Direction>) -> Result<Vec<Route>, ApiError> {
        let path = match direction {
            Some(direction) => format!("/routes?direction={}", direction),
            None => "/routes".to_string(),
        };
        self.get(Target::Gateway, &path).await
    }

    async fn create_route(&self, payload: &NewRoute) -> Result<Route, ApiError> {
        self.post(Target::Gateway, "/routes", payload).await
    }

    async fn update_route(&self, id: &str, patch: &RoutePatch) -> Result<Route, ApiError> {
        self.put(Target::Gateway, &path_with_id("routes", id), patch).await
    }

    async fn delete_route(&self, id: &str) -> Result<(), ApiError> {
        self.call(Method::DELETE, Target::Gateway, &path_with_id("routes", id)).await
    }

    async fn reorder_route(&self, id: &str, order: u32) -> Result<(), ApiError> {
        let path = format!("{}/order", path_with_id("routes", id));
        self.send(Method::PUT, Target::Gateway, &path, Some(&ReorderRequest { order }), None)
            .await
            .map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Users & Groups
    // -------------------------------------------------------------------------

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get(Target::Api, "/users").await
    }

    async fn create_user(&self, payload: &NewUser) -> Result<User, ApiError> {
        self.post(Target::Api, "/users", payload).await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, ApiError> {
        self.put(Target::Api, &path_with_id("users", id), patch).await
    }

    async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.call(Method::DELETE, Target::Api, &path_with_id("users", id)).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ApiError> {
        self.get(Target::Api, "/groups").await
    }

    async fn create_group(&self, payload: &NewGroup) -> Result<Group, ApiError> {
        self.post(Target::Api, "/groups", payload).await
    }

    async fn update_group(&self, id: &str, patch: &GroupPatch) -> Result<Group, ApiError> {
        self.put(Target::Api, &path_with_id("groups", id), patch).await
    }

    async fn delete_group(&self, id: &str) -> Result<(), ApiError> {
        self.call(Method::DELETE, Target::Api, &path_with_id("groups", id)).await
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    async fn system_stats(&self) -> Result<SystemStats, ApiError> {
        self.get(Target::Gateway, "/stats/system").await
    }

    async fn smpp_stats(&self) -> Result<TrafficStats, ApiError> {
        self.get(Target::Gateway, "/stats/smpp").await
    }

    async fn http_stats(&self) -> Result<TrafficStats, ApiError> {
        self.get(Target::Gateway, "/stats/http").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminConfig, GatewayConfig};

    fn client(gateway: Option<GatewayConfig>) -> HttpGatewayApi {
        let mut config = AdminConfig::with_api_url("http://localhost:8080/api/");
        config.gateway = gateway;
        HttpGatewayApi::new(&config, SessionContext::in_memory()).unwrap()
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        assert_eq!(path_with_id("connectors", "carrier 1/a"), "/connectors/carrier%201%2Fa");
        assert_eq!(path_with_id("routes", "r-1"), "/routes/r-1");
    }

    #[test]
    fn test_urls_without_gateway_use_api_base() {
        let api = client(None);
        assert_eq!(api.url(Target::Gateway, "/connectors"), "http://localhost:8080/api/connectors");
        assert_eq!(api.url(Target::Api, "/auth/login"), "http://localhost:8080/api/auth/login");
    }

    #[test]
    fn test_urls_with_gateway() {
        let api = client(Some(GatewayConfig {
            url: "http://gateway:8080/".to_string(),
            username: Some("gw".to_string()),
            password: Some("pw".to_string()),
        }));
        assert_eq!(api.url(Target::Gateway, "/routes"), "http://gateway:8080/routes");
        assert_eq!(api.url(Target::Api, "/users"), "http://localhost:8080/api/users");
        assert!(api.gateway.as_ref().unwrap().credentials.is_some());
    }

    #[test]
    fn test_gateway_credentials_need_both_parts() {
        let api = client(Some(GatewayConfig {
            url: "http://gateway:8080".to_string(),
            username: Some("gw".to_string()),
            password: None,
        }));
        assert!(api.gateway.as_ref().unwrap().credentials.is_none());
    }
}
