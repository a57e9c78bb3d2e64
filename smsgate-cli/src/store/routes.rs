//! Route container
//!
//! Holds the routes of both directions. Moves go through
//! [`ordering`](super::ordering): the gateway is asked first, and only an
//! accepted move renumbers the local list.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::ordering::{self, MovePlan, Step};
use super::{upsert, EntityList, EntityState, Refresh, StoreError};
use crate::client::GatewayApi;
use crate::scope::ViewScope;
use smsgate_shared::{Direction, Route, RouteForm, RoutePatch, RouteStatus};

#[derive(Clone)]
pub struct RouteStore {
    api: Arc<dyn GatewayApi>,
    list: EntityList<Route>,
}

impl RouteStore {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self {
            api,
            list: EntityList::new("route"),
        }
    }

    pub async fn snapshot(&self) -> EntityState<Route> {
        self.list.snapshot().await
    }

    /// Routes of one direction in evaluation order
    pub async fn for_direction(&self, direction: Direction) -> Vec<Route> {
        let items = self.list.items().await;
        ordering::ranked(&items, direction).into_iter().cloned().collect()
    }

    pub async fn fetch_all(&self) -> Result<usize, StoreError> {
        self.fetch_all_in(&ViewScope::new()).await
    }

    pub async fn fetch_all_in(&self, scope: &ViewScope) -> Result<usize, StoreError> {
        self.list.fetch(scope, self.api.list_routes(None)).await
    }

    pub async fn create(&self, form: RouteForm) -> Result<Route, StoreError> {
        let payload = form.into_payload()?;
        let route = self
            .list
            .mutate(self.api.create_route(&payload), |items, route: Route| {
                items.push(route.clone());
                route
            })
            .await?;
        info!("Created {} route {} at position {}", route.direction, route.id, route.order);
        Ok(route)
    }

    pub async fn update(&self, id: &str, patch: RoutePatch) -> Result<Route, StoreError> {
        self.list
            .mutate(self.api.update_route(id, &patch), |items, route: Route| {
                upsert(items, route.clone());
                route
            })
            .await
    }

    pub async fn set_status(&self, id: &str, status: RouteStatus) -> Result<Route, StoreError> {
        let patch = RoutePatch {
            status: Some(status),
            ..Default::default()
        };
        self.update(id, patch).await
    }

    /// Delete a route and close the gap it leaves in its direction
    ///
    /// A route missing from the local list is still deleted on the gateway;
    /// the list is then refetched to pick up the gateway's renumbering.
    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        match self.list.get(id).await.map(|r| r.direction) {
            Some(direction) => {
                self.list
                    .mutate(self.api.delete_route(id), |items, ()| {
                        items.retain(|r| r.id != id);
                        ordering::renumber(items, direction);
                    })
                    .await?;
            }
            None => {
                self.list.mutate(self.api.delete_route(id), |_, ()| ()).await?;
                self.fetch_all().await?;
            }
        }
        info!("Deleted route {}", id);
        Ok(())
    }

    /// Move a route to `position` within its direction
    ///
    /// Returns `false` without contacting the gateway when the route is
    /// already there.
    pub async fn reorder(&self, id: &str, position: u32) -> Result<bool, StoreError> {
        let items = self.list.items().await;
        if !items.iter().any(|r| r.id == id) {
            return Err(self.list.not_found(id));
        }
        match ordering::plan_move(&items, id, position) {
            Some(plan) => self.apply(plan).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Move one step up (earlier) or down (later)
    pub async fn step(&self, id: &str, step: Step) -> Result<bool, StoreError> {
        let items = self.list.items().await;
        if !items.iter().any(|r| r.id == id) {
            return Err(self.list.not_found(id));
        }
        match ordering::plan_step(&items, id, step) {
            Some(plan) => self.apply(plan).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn move_up(&self, id: &str) -> Result<bool, StoreError> {
        self.step(id, Step::Up).await
    }

    pub async fn move_down(&self, id: &str) -> Result<bool, StoreError> {
        self.step(id, Step::Down).await
    }

    async fn apply(&self, plan: MovePlan) -> Result<(), StoreError> {
        self.list
            .mutate(self.api.reorder_route(&plan.route_id, plan.to), |items, ()| {
                ordering::apply_move(items, &plan)
            })
            .await?;
        info!("Moved route {} from {} to {}", plan.route_id, plan.from, plan.to);
        Ok(())
    }
}

#[async_trait]
impl Refresh for RouteStore {
    fn name(&self) -> &'static str {
        "routes"
    }

    async fn refresh(&self, scope: &ViewScope) -> Result<(), StoreError> {
        self.fetch_all_in(scope).await.map(|_| ())
    }
}
