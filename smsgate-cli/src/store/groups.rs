//! Group container

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{upsert, EntityList, EntityState, Refresh, StoreError};
use crate::client::GatewayApi;
use crate::scope::ViewScope;
use smsgate_shared::{Group, GroupForm, GroupPatch};

#[derive(Clone)]
pub struct GroupStore {
    api: Arc<dyn GatewayApi>,
    list: EntityList<Group>,
}

impl GroupStore {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self {
            api,
            list: EntityList::new("group"),
        }
    }

    pub async fn snapshot(&self) -> EntityState<Group> {
        self.list.snapshot().await
    }

    pub async fn fetch_all(&self) -> Result<usize, StoreError> {
        self.fetch_all_in(&ViewScope::new()).await
    }

    pub async fn fetch_all_in(&self, scope: &ViewScope) -> Result<usize, StoreError> {
        self.list.fetch(scope, self.api.list_groups()).await
    }

    pub async fn create(&self, form: GroupForm) -> Result<Group, StoreError> {
        let payload = form.into_payload()?;
        let group = self
            .list
            .mutate(self.api.create_group(&payload), |items, group: Group| {
                items.push(group.clone());
                group
            })
            .await?;
        info!("Created group {}", group.name);
        Ok(group)
    }

    pub async fn update(&self, id: &str, patch: GroupPatch) -> Result<Group, StoreError> {
        self.list
            .mutate(self.api.update_group(id, &patch), |items, group: Group| {
                upsert(items, group.clone());
                group
            })
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.list
            .mutate(self.api.delete_group(id), |items, ()| items.retain(|g| g.id != id))
            .await?;
        info!("Deleted group {}", id);
        Ok(())
    }
}

#[async_trait]
impl Refresh for GroupStore {
    fn name(&self) -> &'static str {
        "groups"
    }

    async fn refresh(&self, scope: &ViewScope) -> Result<(), StoreError> {
        self.fetch_all_in(scope).await.map(|_| ())
    }
}
