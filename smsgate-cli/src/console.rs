//! Console wiring
//!
//! [`Console`] owns one of each container over a shared gateway client and
//! session context, the way the command handlers and tests use them.

use std::sync::Arc;
use tracing::info;

use crate::client::{ApiError, GatewayApi, HttpGatewayApi};
use crate::config::AdminConfig;
use crate::session::{AuthStatus, FileStorage, SessionContext, SessionStore};
use crate::shell::Navigator;
use crate::store::{ConnectorStore, GroupStore, RouteStore, StatsStore, UserStore};

pub struct Console {
    pub session: SessionContext,
    pub auth: SessionStore,
    pub api: Arc<dyn GatewayApi>,
    pub connectors: Arc<ConnectorStore>,
    pub routes: Arc<RouteStore>,
    pub users: Arc<UserStore>,
    pub groups: Arc<GroupStore>,
    pub stats: Arc<StatsStore>,
}

impl Console {
    pub fn new(api: Arc<dyn GatewayApi>, session: SessionContext) -> Self {
        Self {
            auth: SessionStore::new(api.clone(), session.clone()),
            connectors: Arc::new(ConnectorStore::new(api.clone())),
            routes: Arc::new(RouteStore::new(api.clone())),
            users: Arc::new(UserStore::new(api.clone())),
            groups: Arc::new(GroupStore::new(api.clone())),
            stats: Arc::new(StatsStore::new(api.clone())),
            session,
            api,
        }
    }

    /// HTTP client with the session stored in the configured data directory
    pub fn from_config(config: &AdminConfig) -> Result<Self, ApiError> {
        let storage = FileStorage::in_dir(&config.data_dir);
        info!("Session file: {}", storage.path().display());
        let session = SessionContext::new(Arc::new(storage));
        let api = HttpGatewayApi::new(config, session.clone())?;
        Ok(Self::new(Arc::new(api), session))
    }

    /// Restore and validate the persisted session
    pub async fn init(&self) -> AuthStatus {
        self.auth.validate().await
    }

    pub fn navigator(&self) -> Navigator {
        Navigator::new(self.session.clone())
    }

    /// Release the in-memory session; it stays persisted for the next run
    pub async fn teardown(&self) {
        self.session.teardown().await;
    }
}
