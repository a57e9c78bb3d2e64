//! Entity State Containers
//!
//! One container per resource, each holding `{items, loading, error}`:
//! - Fetches replace the list; a failed fetch keeps the previous list and
//!   records the error (stale but available)
//! - Mutations are applied locally only after the gateway accepts them
//! - A fetch started in a torn-down [`ViewScope`] is discarded
//!
//! Containers are cheap to clone and share their state.

mod connectors;
mod groups;
pub mod ordering;
mod routes;
mod stats;
mod users;

pub use connectors::ConnectorStore;
pub use groups::GroupStore;
pub use routes::RouteStore;
pub use stats::{DashboardSnapshot, StatsState, StatsStore};
pub use users::UserStore;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::ApiError;
use crate::scope::ViewScope;
use smsgate_shared::{Entity, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Message shown to the operator
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Snapshot of one entity list
#[derive(Debug, Clone)]
pub struct EntityState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T: Entity> EntityState<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Something a poller can refresh
#[async_trait]
pub trait Refresh: Send + Sync {
    fn name(&self) -> &'static str;

    async fn refresh(&self, scope: &ViewScope) -> Result<(), StoreError>;
}

// =============================================================================
// Shared list cell
// =============================================================================

/// The `{items, loading, error}` cell behind each container
pub(crate) struct EntityList<T> {
    entity: &'static str,
    state: Arc<RwLock<EntityState<T>>>,
}

impl<T> Clone for EntityList<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            state: self.state.clone(),
        }
    }
}

impl<T: Entity> EntityList<T> {
    pub(crate) fn new(entity: &'static str) -> Self {
        Self {
            entity,
            state: Arc::new(RwLock::new(EntityState::default())),
        }
    }

    pub(crate) async fn snapshot(&self) -> EntityState<T> {
        self.state.read().await.clone()
    }

    pub(crate) async fn items(&self) -> Vec<T> {
        self.state.read().await.items.clone()
    }

    pub(crate) async fn get(&self, id: &str) -> Option<T> {
        self.state.read().await.get(id).cloned()
    }

    pub(crate) fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            entity: self.entity,
            id: id.to_string(),
        }
    }

    /// Run a list request and replace the items with its result
    pub(crate) async fn fetch<F>(&self, scope: &ViewScope, request: F) -> Result<usize, StoreError>
    where
        F: Future<Output = Result<Vec<T>, ApiError>>,
    {
        if !scope.is_active() {
            return Err(StoreError::Cancelled);
        }
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = request.await;

        let mut state = self.state.write().await;
        state.loading = false;
        if !scope.is_active() {
            debug!("Discarding {} fetch from a closed view", self.entity);
            return Err(StoreError::Cancelled);
        }
        match result {
            Ok(items) => {
                let count = items.len();
                state.items = items;
                debug!("Loaded {} {}s", count, self.entity);
                Ok(count)
            }
            Err(e) => {
                state.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    /// Run a mutation and, once it succeeds, apply it to the local items
    pub(crate) async fn mutate<R, U, F, A>(&self, request: F, apply: A) -> Result<U, StoreError>
    where
        F: Future<Output = Result<R, ApiError>>,
        A: FnOnce(&mut Vec<T>, R) -> U,
    {
        let result = request.await;
        let mut state = self.state.write().await;
        match result {
            Ok(value) => {
                state.error = None;
                Ok(apply(&mut state.items, value))
            }
            Err(e) => {
                state.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }
}

/// Replace the item with the same id, or append it
pub(crate) fn upsert<T: Entity>(items: &mut Vec<T>, item: T) {
    match items.iter_mut().find(|existing| existing.id() == item.id()) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        label: &'static str,
    }

    impl Entity for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, label: &'static str) -> Item {
        Item { id: id.to_string(), label }
    }

    #[tokio::test]
    async fn test_fetch_replaces_items() {
        let list = EntityList::new("item");
        let count = list
            .fetch(&ViewScope::new(), async { Ok(vec![item("1", "a"), item("2", "b")]) })
            .await
            .unwrap();

        assert_eq!(count, 2);
        let state = list.snapshot().await;
        assert!(!state.loading);
        assert_eq!(state.get("2").map(|i| i.label), Some("b"));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_stale_items() {
        let list = EntityList::new("item");
        let scope = ViewScope::new();
        list.fetch(&scope, async { Ok(vec![item("1", "a")]) }).await.unwrap();

        let result = list
            .fetch(&scope, async { Err(ApiError::http(503, "")) })
            .await;

        assert!(matches!(result, Err(StoreError::Api(_))));
        let state = list.snapshot().await;
        assert_eq!(state.len(), 1);
        assert!(!state.loading);
        assert_eq!(
            state.error.as_deref(),
            Some("The gateway failed to process the request. Try again later.")
        );
    }

    #[tokio::test]
    async fn test_fetch_in_closed_scope_is_discarded() {
        let list = EntityList::new("item");
        let scope = ViewScope::new();
        let closing = scope.clone();

        let result = list
            .fetch(&scope, async move {
                closing.teardown();
                Ok(vec![item("1", "late")])
            })
            .await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
        let state = list.snapshot().await;
        assert!(state.is_empty());
        assert!(!state.loading);

        let result = list.fetch(&scope, async { Ok(vec![item("2", "never")]) }).await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_items() {
        let list = EntityList::new("item");
        list.fetch(&ViewScope::new(), async { Ok(vec![item("1", "a")]) }).await.unwrap();

        let result = list
            .mutate(async { Err::<Item, _>(ApiError::http(409, "taken")) }, |items, new| {
                items.push(new)
            })
            .await;

        assert!(result.is_err());
        let state = list.snapshot().await;
        assert_eq!(state.items, vec![item("1", "a")]);
        assert_eq!(state.error.as_deref(), Some("taken"));
    }

    #[test]
    fn test_upsert() {
        let mut items = vec![item("1", "a")];
        upsert(&mut items, item("1", "b"));
        upsert(&mut items, item("2", "c"));
        assert_eq!(items, vec![item("1", "b"), item("2", "c")]);
    }
}
