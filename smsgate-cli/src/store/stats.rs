//! Dashboard statistics
//!
//! Gathers the three stats endpoints into one snapshot. Like the entity
//! lists, a failed refresh keeps the last snapshot and records the error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Refresh, StoreError};
use crate::client::GatewayApi;
use crate::scope::ViewScope;
use smsgate_shared::{SystemStats, TrafficStats};

/// Everything the dashboard shows at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub system: SystemStats,
    pub smpp: TrafficStats,
    pub http: TrafficStats,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct StatsState {
    pub snapshot: Option<DashboardSnapshot>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct StatsStore {
    api: Arc<dyn GatewayApi>,
    state: Arc<RwLock<StatsState>>,
}

impl StatsStore {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(StatsState::default())),
        }
    }

    pub async fn state(&self) -> StatsState {
        self.state.read().await.clone()
    }

    pub async fn snapshot(&self) -> Option<DashboardSnapshot> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn refresh_in(&self, scope: &ViewScope) -> Result<DashboardSnapshot, StoreError> {
        if !scope.is_active() {
            return Err(StoreError::Cancelled);
        }
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = tokio::try_join!(
            self.api.system_stats(),
            self.api.smpp_stats(),
            self.api.http_stats(),
        );

        let mut state = self.state.write().await;
        state.loading = false;
        if !scope.is_active() {
            debug!("Discarding stats refresh from a closed view");
            return Err(StoreError::Cancelled);
        }
        match result {
            Ok((system, smpp, http)) => {
                let snapshot = DashboardSnapshot {
                    system,
                    smpp,
                    http,
                    refreshed_at: Utc::now(),
                };
                state.snapshot = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                state.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Refresh for StatsStore {
    fn name(&self) -> &'static str {
        "stats"
    }

    async fn refresh(&self, scope: &ViewScope) -> Result<(), StoreError> {
        self.refresh_in(scope).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::store::test_support::demo_as_admin;

    #[tokio::test]
    async fn test_refresh_builds_snapshot() {
        let (_context, api) = demo_as_admin().await;
        let store = StatsStore::new(api);

        let snapshot = store.refresh_in(&ViewScope::new()).await.unwrap();

        assert_eq!(snapshot.system.total_sent, 1200);
        assert_eq!(snapshot.smpp.total_sent(), 1200);
        assert!(snapshot.http.connectors.is_empty());
        assert_eq!(store.snapshot().await, Some(snapshot));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_snapshot() {
        let (_context, api) = demo_as_admin().await;
        let store = StatsStore::new(api.clone());
        let first = store.refresh_in(&ViewScope::new()).await.unwrap();

        api.fail_next(ApiError::Timeout);
        assert!(store.refresh_in(&ViewScope::new()).await.is_err());

        let state = store.state().await;
        assert_eq!(state.snapshot, Some(first));
        assert!(!state.loading);
        assert!(state.error.unwrap().contains("did not respond"));
    }

    #[tokio::test]
    async fn test_closed_scope_skips_refresh() {
        let (_context, api) = demo_as_admin().await;
        let store = StatsStore::new(api.clone());
        let scope = ViewScope::new();
        scope.teardown();
        let requests = api.request_count();

        assert!(matches!(store.refresh_in(&scope).await, Err(StoreError::Cancelled)));
        assert_eq!(api.request_count(), requests);
        assert!(store.snapshot().await.is_none());
    }
}
