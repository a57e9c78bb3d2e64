//! User container

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{upsert, EntityList, EntityState, Refresh, StoreError};
use crate::client::GatewayApi;
use crate::scope::ViewScope;
use smsgate_shared::{User, UserForm, UserPatch};

#[derive(Clone)]
pub struct UserStore {
    api: Arc<dyn GatewayApi>,
    list: EntityList<User>,
}

impl UserStore {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self {
            api,
            list: EntityList::new("user"),
        }
    }

    pub async fn snapshot(&self) -> EntityState<User> {
        self.list.snapshot().await
    }

    pub async fn fetch_all(&self) -> Result<usize, StoreError> {
        self.fetch_all_in(&ViewScope::new()).await
    }

    pub async fn fetch_all_in(&self, scope: &ViewScope) -> Result<usize, StoreError> {
        self.list.fetch(scope, self.api.list_users()).await
    }

    pub async fn create(&self, form: UserForm) -> Result<User, StoreError> {
        let payload = form.into_payload()?;
        let user = self
            .list
            .mutate(self.api.create_user(&payload), |items, user: User| {
                items.push(user.clone());
                user
            })
            .await?;
        info!("Created user {}", user.username);
        Ok(user)
    }

    pub async fn update(&self, id: &str, patch: UserPatch) -> Result<User, StoreError> {
        self.list
            .mutate(self.api.update_user(id, &patch), |items, user: User| {
                upsert(items, user.clone());
                user
            })
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.list
            .mutate(self.api.delete_user(id), |items, ()| items.retain(|u| u.id != id))
            .await?;
        info!("Deleted user {}", id);
        Ok(())
    }
}

#[async_trait]
impl Refresh for UserStore {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn refresh(&self, scope: &ViewScope) -> Result<(), StoreError> {
        self.fetch_all_in(scope).await.map(|_| ())
    }
}
