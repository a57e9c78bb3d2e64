//! Connector container

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{upsert, EntityList, EntityState, Refresh, StoreError};
use crate::client::GatewayApi;
use crate::scope::ViewScope;
use smsgate_shared::{Connector, ConnectorForm, ConnectorPatch, ConnectorStatus, StatusSummary};

#[derive(Clone)]
pub struct ConnectorStore {
    api: Arc<dyn GatewayApi>,
    list: EntityList<Connector>,
}

impl ConnectorStore {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self {
            api,
            list: EntityList::new("connector"),
        }
    }

    pub async fn snapshot(&self) -> EntityState<Connector> {
        self.list.snapshot().await
    }

    pub async fn get(&self, id: &str) -> Option<Connector> {
        self.list.get(id).await
    }

    pub async fn fetch_all(&self) -> Result<usize, StoreError> {
        self.fetch_all_in(&ViewScope::new()).await
    }

    pub async fn fetch_all_in(&self, scope: &ViewScope) -> Result<usize, StoreError> {
        self.list.fetch(scope, self.api.list_connectors()).await
    }

    /// Fetch one connector and merge it into the list
    pub async fn fetch_one(&self, id: &str) -> Result<Connector, StoreError> {
        let result = self
            .list
            .mutate(self.api.get_connector(id), |items, connector: Connector| {
                upsert(items, connector.clone());
                connector
            })
            .await;
        match result {
            Err(StoreError::Api(e)) if e.is_not_found() => Err(self.list.not_found(id)),
            other => other,
        }
    }

    pub async fn create(&self, form: ConnectorForm) -> Result<Connector, StoreError> {
        let payload = form.into_payload()?;
        let connector = self
            .list
            .mutate(self.api.create_connector(&payload), |items, connector: Connector| {
                items.push(connector.clone());
                connector
            })
            .await?;
        info!("Created {} connector {}", connector.kind.type_name(), connector.cid);
        Ok(connector)
    }

    pub async fn update(&self, id: &str, patch: ConnectorPatch) -> Result<Connector, StoreError> {
        self.list
            .mutate(self.api.update_connector(id, &patch), |items, connector: Connector| {
                upsert(items, connector.clone());
                connector
            })
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.list
            .mutate(self.api.delete_connector(id), |items, ()| {
                items.retain(|c| c.id != id);
            })
            .await?;
        info!("Deleted connector {}", id);
        Ok(())
    }

    /// Bind the connector; on success it is marked connected
    pub async fn start(&self, id: &str) -> Result<(), StoreError> {
        self.list
            .mutate(self.api.start_connector(id), |items, ()| {
                set_status(items, id, ConnectorStatus::Connected)
            })
            .await
    }

    /// Unbind the connector; on success it is marked disconnected
    pub async fn stop(&self, id: &str) -> Result<(), StoreError> {
        self.list
            .mutate(self.api.stop_connector(id), |items, ()| {
                set_status(items, id, ConnectorStatus::Disconnected)
            })
            .await
    }

    pub async fn status_summary(&self) -> StatusSummary {
        StatusSummary::from_connectors(&self.list.items().await)
    }
}

fn set_status(items: &mut [Connector], id: &str, status: ConnectorStatus) {
    if let Some(connector) = items.iter_mut().find(|c| c.id == id) {
        connector.status = status;
    }
}

#[async_trait]
impl Refresh for ConnectorStore {
    fn name(&self) -> &'static str {
        "connectors"
    }

    async fn refresh(&self, scope: &ViewScope) -> Result<(), StoreError> {
        self.fetch_all_in(scope).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, InMemoryGatewayApi};
    use crate::store::test_support::demo_as_admin;
    use smsgate_shared::HttpConnectorForm;

    async fn setup() -> (Arc<InMemoryGatewayApi>, ConnectorStore) {
        let (_context, api) = demo_as_admin().await;
        let store = ConnectorStore::new(api.clone());
        store.fetch_all().await.unwrap();
        (api, store)
    }

    fn http_form(cid: &str) -> ConnectorForm {
        ConnectorForm::Http(HttpConnectorForm {
            cid: cid.to_string(),
            base_url: "https://hooks.example.com/mo".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_create_appends_exactly_once() {
        let (_api, store) = setup().await;
        let before = store.snapshot().await.len();

        let connector = store.create(http_form("api1")).await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.len(), before + 1);
        assert_eq!(state.get("api1"), Some(&connector));
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_network() {
        let (api, store) = setup().await;
        let requests = api.request_count();

        let result = store.create(http_form("bad cid")).await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(api.request_count(), requests);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_list_unchanged() {
        let (_api, store) = setup().await;
        let before = store.snapshot().await.items;

        let error = store.create(http_form("carrier1")).await.unwrap_err();

        assert_eq!(error.user_message(), "Connector carrier1 already exists");
        assert_eq!(store.snapshot().await.items, before);
    }

    #[tokio::test]
    async fn test_stop_marks_disconnected() {
        let (_api, store) = setup().await;
        assert_eq!(store.get("carrier1").await.unwrap().status, ConnectorStatus::Connected);

        store.stop("carrier1").await.unwrap();

        assert_eq!(store.get("carrier1").await.unwrap().status, ConnectorStatus::Disconnected);
        let summary = store.status_summary().await;
        assert_eq!(summary.count(ConnectorStatus::Disconnected), 2);
    }

    #[tokio::test]
    async fn test_failed_start_keeps_status() {
        let (api, store) = setup().await;
        api.fail_next(ApiError::http(500, "bind failed"));

        assert!(store.start("carrier2").await.is_err());
        assert_eq!(store.get("carrier2").await.unwrap().status, ConnectorStatus::Disconnected);
        assert!(store.snapshot().await.error.is_some());
    }

    #[tokio::test]
    async fn test_remove_and_fetch_one() {
        let (_api, store) = setup().await;

        store.remove("carrier2").await.unwrap();
        assert!(store.get("carrier2").await.is_none());
        assert_eq!(store.snapshot().await.len(), 1);

        let result = store.fetch_one("carrier2").await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "connector", .. })));
        assert_eq!(store.fetch_one("carrier1").await.unwrap().cid, "carrier1");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_list() {
        let (api, store) = setup().await;
        api.fail_next(ApiError::Network("connection reset".to_string()));

        assert!(store.refresh(&ViewScope::new()).await.is_err());

        let state = store.snapshot().await;
        assert_eq!(state.len(), 2);
        assert!(state.error.unwrap().contains("Unable to reach"));
    }
}
