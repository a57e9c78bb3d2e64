//! Console Shell
//!
//! Maps paths to views and guards them:
//! - Views other than login need a live session; without one the shell
//!   shows the login view and remembers where the operator was going
//! - A session that ends (logout, expiry, 401) sends the operator back to login
//! - Areas the operator's roles do not cover show a forbidden view

pub mod tables;

use std::fmt;
use tracing::debug;

use crate::rbac::{self, Area};
use crate::session::{AuthEvent, AuthStatus, SessionContext};
use smsgate_shared::Direction;

/// A screen of the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Login,
    Dashboard,
    Connectors,
    Connector(String),
    Routes(Direction),
    Users,
    Groups,
    Statistics,
    Forbidden(Area),
    NotFound(String),
}

impl View {
    /// Resolve a path such as `/routes/mo` or `/connectors/carrier1`
    pub fn from_path(path: &str) -> View {
        let segments: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [] | ["dashboard"] => View::Dashboard,
            ["login"] => View::Login,
            ["connectors"] => View::Connectors,
            ["connectors", id] => View::Connector(id.to_string()),
            ["routes"] => View::Routes(Direction::Mt),
            ["routes", direction] => match direction.parse() {
                Ok(direction) => View::Routes(direction),
                Err(_) => View::NotFound(path.to_string()),
            },
            ["users"] => View::Users,
            ["groups"] => View::Groups,
            ["statistics"] => View::Statistics,
            _ => View::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            View::Login => "/login".to_string(),
            View::Dashboard => "/dashboard".to_string(),
            View::Connectors => "/connectors".to_string(),
            View::Connector(id) => format!("/connectors/{}", id),
            View::Routes(direction) => format!("/routes/{}", direction),
            View::Users => "/users".to_string(),
            View::Groups => "/groups".to_string(),
            View::Statistics => "/statistics".to_string(),
            View::Forbidden(area) => format!("/{}", area),
            View::NotFound(path) => path.clone(),
        }
    }

    /// Role-gated area of this view
    pub fn area(&self) -> Option<Area> {
        match self {
            View::Dashboard => Some(Area::Dashboard),
            View::Connectors | View::Connector(_) => Some(Area::Connectors),
            View::Routes(_) => Some(Area::Routes),
            View::Users => Some(Area::Users),
            View::Groups => Some(Area::Groups),
            View::Statistics => Some(Area::Statistics),
            View::Login | View::Forbidden(_) | View::NotFound(_) => None,
        }
    }

    pub fn requires_session(&self) -> bool {
        !matches!(self, View::Login | View::NotFound(_))
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Current view plus the guard that decides it
pub struct Navigator {
    session: SessionContext,
    current: View,
    pending: Option<View>,
}

impl Navigator {
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            current: View::Login,
            pending: None,
        }
    }

    pub fn current(&self) -> &View {
        &self.current
    }

    /// View to return to after login
    pub fn pending(&self) -> Option<&View> {
        self.pending.as_ref()
    }

    pub async fn navigate_to(&mut self, path: &str) -> &View {
        self.navigate(View::from_path(path)).await
    }

    pub async fn navigate(&mut self, target: View) -> &View {
        let user = self.session.user().await;

        self.current = match (user, target) {
            (None, View::Login) => View::Login,
            (None, target) if target.requires_session() => {
                debug!("No session, redirecting {} to login", target);
                self.pending = Some(target);
                View::Login
            }
            (None, target) => target,
            (Some(_), View::Login) => self.pending.take().unwrap_or(View::Dashboard),
            (Some(user), target) => match target.area() {
                Some(area) if !rbac::can_access(&user, area) => View::Forbidden(area),
                _ => target,
            },
        };
        &self.current
    }

    /// React to a session status change
    pub async fn on_auth_event(&mut self, event: &AuthEvent) -> &View {
        match event.status {
            AuthStatus::Anonymous if self.current.requires_session() => {
                let previous = std::mem::replace(&mut self.current, View::Login);
                self.pending = Some(previous);
            }
            AuthStatus::Authenticated if self.current == View::Login => {
                return self.navigate(View::Login).await;
            }
            _ => {}
        }
        &self.current
    }
}
