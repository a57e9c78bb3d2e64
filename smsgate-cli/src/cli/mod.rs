//! CLI subcommands for the gateway console
//!
//! Provides commands for managing:
//! - Connectors (list, get, create, delete, start, stop)
//! - Routes (list, create, delete, reorder, enable, disable)
//! - Users and groups (list, create, delete)
//! - Statistics (one-shot dashboard or a live `watch`)

use anyhow::{anyhow, bail};
use clap::Subcommand;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use smsgate::poll::spawn_poller;
use smsgate::rbac::{self, Area};
use smsgate::scope::ViewScope;
use smsgate::session::AuthStatus;
use smsgate::shell::tables;
use smsgate::store::{Refresh, StoreError};
use smsgate::Console;
use smsgate_shared::{
    BindMode, ConnectorForm, Direction, GroupAction, GroupForm, HttpConnectorForm, HttpMethod,
    LoginForm, PermissionMap, RouteForm, RouteStatus, RouteType, SessionUser,
    SmppConnectorForm, UserForm,
};

/// Check the session and the area before a command runs
async fn require(console: &Console, area: Area) -> anyhow::Result<SessionUser> {
    let user = console
        .session
        .user()
        .await
        .ok_or_else(|| anyhow!("Not logged in. Run `smsgate login` first."))?;
    if !rbac::can_access(&user, area) {
        bail!("Your roles do not allow access to {}", area);
    }
    Ok(user)
}

fn failed(error: StoreError) -> anyhow::Error {
    anyhow!(error.user_message())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `resource:action,action`
fn parse_permission(spec: &str) -> Result<(String, BTreeSet<GroupAction>), String> {
    let (resource, actions) = spec
        .split_once(':')
        .ok_or_else(|| format!("Expected resource:actions, got {}", spec))?;
    let actions = actions
        .split(',')
        .filter(|a| !a.trim().is_empty())
        .map(|a| a.trim().parse())
        .collect::<Result<BTreeSet<GroupAction>, String>>()?;
    Ok((resource.trim().to_string(), actions))
}

// =============================================================================
// Session Commands
// =============================================================================

pub async fn login(console: &Console, username: &str, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            eprint!("Password: ");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let session = console
        .auth
        .login(LoginForm::new(username, password))
        .await?;
    println!("Logged in as {}", session.user.username);
    println!("Session expires {}", session.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

pub async fn logout(console: &Console) -> anyhow::Result<()> {
    console.auth.logout().await;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(console: &Console, status: AuthStatus) -> anyhow::Result<()> {
    let Some(user) = console.session.user().await.filter(|_| status == AuthStatus::Authenticated) else {
        println!("Not logged in.");
        return Ok(());
    };
    let areas = rbac::accessible_areas(&user)
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>();
    println!("Username: {}", user.username);
    println!("Roles:    {}", user.roles.join(", "));
    println!("Areas:    {}", areas.join(", "));
    Ok(())
}

// =============================================================================
// Connector Commands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum ConnectorCommands {
    /// List all connectors
    List {
        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Get details of a specific connector
    Get {
        /// Connector ID
        id: String,
    },
    /// Create an SMPP client connector
    CreateSmpp {
        /// Connector ID
        #[arg(long)]
        cid: String,
        /// SMSC host
        #[arg(long)]
        host: String,
        #[arg(long, default_value = "2775")]
        port: u32,
        #[arg(long)]
        system_id: String,
        #[arg(long, env = "SMSGATE_SMPP_PASSWORD")]
        password: String,
        /// Bind mode (transmitter, receiver, transceiver)
        #[arg(long, default_value = "transceiver")]
        bind: BindMode,
        #[arg(long)]
        ssl: bool,
    },
    /// Create an HTTP client connector
    CreateHttp {
        /// Connector ID
        #[arg(long)]
        cid: String,
        /// Endpoint base URL
        #[arg(long)]
        url: String,
        /// HTTP method (get, post)
        #[arg(long, default_value = "post")]
        method: HttpMethod,
        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        request_timeout: u32,
        #[arg(long, requires = "password")]
        username: Option<String>,
        #[arg(long, requires = "username")]
        password: Option<String>,
    },
    /// Delete a connector
    Delete {
        /// Connector ID
        id: String,
        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Start (bind) a connector
    Start {
        id: String,
    },
    /// Stop (unbind) a connector
    Stop {
        id: String,
    },
}

impl ConnectorCommands {
    pub async fn execute(&self, console: &Console) -> anyhow::Result<()> {
        require(console, Area::Connectors).await?;
        let store = &console.connectors;

        match self {
            ConnectorCommands::List { format } => {
                store.fetch_all().await.map_err(failed)?;
                let state = store.snapshot().await;
                if format == "json" {
                    print_json(&state.items)?;
                } else {
                    print!("{}", tables::connectors(&state.items));
                }
            }
            ConnectorCommands::Get { id } => {
                let connector = store.fetch_one(id).await.map_err(failed)?;
                print_json(&connector)?;
            }
            ConnectorCommands::CreateSmpp { cid, host, port, system_id, password, bind, ssl } => {
                let form = ConnectorForm::Smpp(SmppConnectorForm {
                    cid: cid.clone(),
                    host: host.clone(),
                    port: *port,
                    system_id: system_id.clone(),
                    password: password.clone(),
                    bind_mode: *bind,
                    use_ssl: *ssl,
                    ..Default::default()
                });
                let connector = store.create(form).await.map_err(failed)?;
                println!("Connector {} created.", connector.cid);
            }
            ConnectorCommands::CreateHttp { cid, url, method, request_timeout, username, password } => {
                let form = ConnectorForm::Http(HttpConnectorForm {
                    cid: cid.clone(),
                    base_url: url.clone(),
                    method: *method,
                    timeout_secs: *request_timeout,
                    use_authentication: username.is_some(),
                    username: username.clone().unwrap_or_default(),
                    password: password.clone().unwrap_or_default(),
                });
                let connector = store.create(form).await.map_err(failed)?;
                println!("Connector {} created.", connector.cid);
            }
            ConnectorCommands::Delete { id, force } => {
                if !force {
                    println!("Are you sure you want to delete connector {}? Use --force to confirm.", id);
                    return Ok(());
                }
                store.remove(id).await.map_err(failed)?;
                println!("Connector {} deleted.", id);
            }
            ConnectorCommands::Start { id } => {
                store.start(id).await.map_err(failed)?;
                println!("Connector {} started.", id);
            }
            ConnectorCommands::Stop { id } => {
                store.stop(id).await.map_err(failed)?;
                println!("Connector {} stopped.", id);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Route Commands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum RouteCommands {
    /// List routes of one direction in evaluation order
    List {
        /// Direction (mt, mo)
        #[arg(short, long, default_value = "mt")]
        direction: Direction,
        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Create a route at the end of its direction
    Create {
        /// Direction (mt, mo)
        #[arg(short, long, default_value = "mt")]
        direction: Direction,
        /// Target connector ID
        #[arg(short, long)]
        connector: String,
        /// Route type (default, static, random, failover)
        #[arg(short = 't', long = "type", default_value = "default")]
        route_type: RouteType,
        /// Price per message
        #[arg(long)]
        rate: Option<f64>,
        /// Create the route disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Delete a route
    Delete {
        id: String,
        #[arg(short, long)]
        force: bool,
    },
    /// Move a route to a zero-based position
    Move {
        id: String,
        position: u32,
    },
    /// Move a route one place earlier
    Up {
        id: String,
    },
    /// Move a route one place later
    Down {
        id: String,
    },
    Enable {
        id: String,
    },
    Disable {
        id: String,
    },
}

impl RouteCommands {
    pub async fn execute(&self, console: &Console) -> anyhow::Result<()> {
        require(console, Area::Routes).await?;
        let store = &console.routes;

        // Reordering works on the cached list
        if !matches!(self, RouteCommands::List { .. } | RouteCommands::Create { .. }) {
            store.fetch_all().await.map_err(failed)?;
        }

        match self {
            RouteCommands::List { direction, format } => {
                store.fetch_all().await.map_err(failed)?;
                let routes = store.for_direction(*direction).await;
                if format == "json" {
                    print_json(&routes)?;
                } else {
                    print!("{}", tables::routes(&routes));
                }
            }
            RouteCommands::Create { direction, connector, route_type, rate, disabled } => {
                let mut form = RouteForm::new(*direction, connector.clone());
                form.route_type = *route_type;
                form.rate = *rate;
                if *disabled {
                    form.status = RouteStatus::Disabled;
                }
                let route = store.create(form).await.map_err(failed)?;
                println!("Route {} created at position {}.", route.id, route.order);
            }
            RouteCommands::Delete { id, force } => {
                if !force {
                    println!("Are you sure you want to delete route {}? Use --force to confirm.", id);
                    return Ok(());
                }
                store.remove(id).await.map_err(failed)?;
                println!("Route {} deleted.", id);
            }
            RouteCommands::Move { id, position } => {
                report_move(id, store.reorder(id, *position).await.map_err(failed)?);
            }
            RouteCommands::Up { id } => {
                report_move(id, store.move_up(id).await.map_err(failed)?);
            }
            RouteCommands::Down { id } => {
                report_move(id, store.move_down(id).await.map_err(failed)?);
            }
            RouteCommands::Enable { id } => {
                store.set_status(id, RouteStatus::Active).await.map_err(failed)?;
                println!("Route {} enabled.", id);
            }
            RouteCommands::Disable { id } => {
                store.set_status(id, RouteStatus::Disabled).await.map_err(failed)?;
                println!("Route {} disabled.", id);
            }
        }
        Ok(())
    }
}

fn report_move(id: &str, moved: bool) {
    if moved {
        println!("Route {} moved.", id);
    } else {
        println!("Route {} is already in that position.", id);
    }
}

// =============================================================================
// User Commands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// List all users
    List {
        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Create a user
    Create {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(long, env = "SMSGATE_NEW_USER_PASSWORD")]
        password: String,
        /// Role to grant (repeatable)
        #[arg(short, long = "role", default_value = "user")]
        roles: Vec<String>,
        /// Group to join (repeatable)
        #[arg(short, long = "group")]
        groups: Vec<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Create the account disabled
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a user
    Delete {
        id: String,
        #[arg(short, long)]
        force: bool,
    },
}

impl UserCommands {
    pub async fn execute(&self, console: &Console) -> anyhow::Result<()> {
        require(console, Area::Users).await?;
        let store = &console.users;

        match self {
            UserCommands::List { format } => {
                store.fetch_all().await.map_err(failed)?;
                let state = store.snapshot().await;
                if format == "json" {
                    print_json(&state.items)?;
                } else {
                    print!("{}", tables::users(&state.items));
                }
            }
            UserCommands::Create { username, email, password, roles, groups, first_name, last_name, inactive } => {
                let form = UserForm {
                    username: username.clone(),
                    email: email.clone(),
                    first_name: first_name.clone().unwrap_or_default(),
                    last_name: last_name.clone().unwrap_or_default(),
                    password: password.clone(),
                    confirm_password: password.clone(),
                    roles: roles.iter().cloned().collect(),
                    group_ids: groups.iter().cloned().collect(),
                    is_active: !inactive,
                };
                let user = store.create(form).await.map_err(failed)?;
                println!("User {} created with ID {}.", user.username, user.id);
            }
            UserCommands::Delete { id, force } => {
                if !force {
                    println!("Are you sure you want to delete user {}? Use --force to confirm.", id);
                    return Ok(());
                }
                store.remove(id).await.map_err(failed)?;
                println!("User {} deleted.", id);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Group Commands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// List all groups
    List {
        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Create a group
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Permission as resource:action[,action] (repeatable)
        #[arg(short, long = "permission", value_parser = parse_permission)]
        permissions: Vec<(String, BTreeSet<GroupAction>)>,
    },
    /// Delete a group
    Delete {
        id: String,
        #[arg(short, long)]
        force: bool,
    },
}

impl GroupCommands {
    pub async fn execute(&self, console: &Console) -> anyhow::Result<()> {
        require(console, Area::Groups).await?;
        let store = &console.groups;

        match self {
            GroupCommands::List { format } => {
                store.fetch_all().await.map_err(failed)?;
                let state = store.snapshot().await;
                if format == "json" {
                    print_json(&state.items)?;
                } else {
                    print!("{}", tables::groups(&state.items));
                }
            }
            GroupCommands::Create { name, description, permissions } => {
                let mut merged = PermissionMap::new();
                for (resource, actions) in permissions {
                    merged
                        .entry(resource.clone())
                        .or_default()
                        .extend(actions.iter().copied());
                }
                let form = GroupForm {
                    name: name.clone(),
                    description: description.clone().unwrap_or_default(),
                    permissions: merged,
                };
                let group = store.create(form).await.map_err(failed)?;
                println!("Group {} created with ID {}.", group.name, group.id);
            }
            GroupCommands::Delete { id, force } => {
                if !force {
                    println!("Are you sure you want to delete group {}? Use --force to confirm.", id);
                    return Ok(());
                }
                store.remove(id).await.map_err(failed)?;
                println!("Group {} deleted.", id);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// One-shot dashboard
pub async fn stats(console: &Console, format: &str) -> anyhow::Result<()> {
    require(console, Area::Statistics).await?;
    let scope = ViewScope::new();

    let snapshot = console.stats.refresh_in(&scope).await.map_err(failed)?;
    if format == "json" {
        return print_json(&snapshot);
    }
    if let Err(e) = console.connectors.fetch_all_in(&scope).await {
        warn!("Connector summary unavailable: {}", e.user_message());
    }
    let summary = console.connectors.status_summary().await;
    print!("{}", tables::dashboard(&snapshot, &summary));
    Ok(())
}

/// Refresh the dashboard every `interval` until Ctrl-C or the session ends
pub async fn watch(console: &Console, interval: Duration) -> anyhow::Result<()> {
    require(console, Area::Statistics).await?;

    let scope = ViewScope::new();
    let stats = spawn_poller(console.stats.clone() as Arc<dyn Refresh>, interval, scope.child());
    let connectors = spawn_poller(console.connectors.clone() as Arc<dyn Refresh>, interval, scope.child());
    let mut auth = console.session.subscribe();
    let mut redraw = tokio::time::interval(Duration::from_millis(500));
    let mut shown = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Watching gateway statistics, press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Stopping watch");
                break;
            }
            changed = auth.changed() => {
                if changed.is_err() || auth.borrow().status == AuthStatus::Anonymous {
                    warn!("Session ended, stopping watch");
                    break;
                }
            }
            _ = redraw.tick() => {
                let Some(snapshot) = console.stats.snapshot().await else { continue };
                if shown == Some(snapshot.refreshed_at) {
                    continue;
                }
                shown = Some(snapshot.refreshed_at);
                let summary = console.connectors.status_summary().await;
                println!();
                print!("{}", tables::dashboard(&snapshot, &summary));
                if let Some(error) = console.stats.state().await.error {
                    println!("Last refresh failed: {}", error);
                }
            }
        }
    }

    scope.teardown();
    stats.stop().await;
    connectors.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsgate::client::InMemoryGatewayApi;
    use smsgate::session::SessionContext;

    async fn console_as(roles: &[&str]) -> Console {
        let session = SessionContext::in_memory();
        let user = SessionUser {
            id: "9".to_string(),
            username: "ops".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        };
        let api = InMemoryGatewayApi::demo(session.clone()).with_account("ops", "pw", user);
        let console = Console::new(Arc::new(api), session);
        console.auth.login(LoginForm::new("ops", "pw")).await.unwrap();
        console
    }

    #[test]
    fn test_parse_permission() {
        let (resource, actions) = parse_permission("routes:view, update").unwrap();
        assert_eq!(resource, "routes");
        assert_eq!(
            actions,
            [GroupAction::View, GroupAction::Update].into_iter().collect()
        );
        assert!(parse_permission("routes").is_err());
        assert!(parse_permission("routes:fly").is_err());
    }

    #[tokio::test]
    async fn test_require_checks_session_and_role() {
        let session = SessionContext::in_memory();
        let console = Console::new(Arc::new(InMemoryGatewayApi::demo(session.clone())), session);
        let err = require(&console, Area::Dashboard).await.unwrap_err();
        assert!(err.to_string().contains("Not logged in"));

        let console = console_as(&["manager"]).await;
        assert!(require(&console, Area::Routes).await.is_ok());
        let err = require(&console, Area::Users).await.unwrap_err();
        assert_eq!(err.to_string(), "Your roles do not allow access to users");
    }

    #[tokio::test]
    async fn test_route_commands_reorder() {
        let console = console_as(&["admin"]).await;
        RouteCommands::Down { id: "r1".to_string() }
            .execute(&console)
            .await
            .unwrap();

        let order: Vec<String> = console
            .routes
            .for_direction(Direction::Mt)
            .await
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec!["r2", "r1", "r3"]);
    }

    #[tokio::test]
    async fn test_delete_without_force_keeps_connector() {
        let console = console_as(&["admin"]).await;
        ConnectorCommands::Delete { id: "carrier1".to_string(), force: false }
            .execute(&console)
            .await
            .unwrap();
        console.connectors.fetch_all().await.unwrap();
        assert!(console.connectors.get("carrier1").await.is_some());
    }
}
