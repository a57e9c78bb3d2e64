//! Role-Based Access Control (RBAC) Module
//!
//! Client-side view gating. The gateway stays authoritative for every
//! request; these checks only decide what the console offers.
//! - Built-in roles and the areas each one may open
//! - Group permissions merged per user

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use smsgate_shared::{Group, GroupAction, PermissionMap, SessionUser, User};

// =============================================================================
// Roles
// =============================================================================

/// Built-in roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Manager => write!(f, "manager"),
            Role::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Known roles of a session user; unknown role names are ignored
pub fn roles_of(user: &SessionUser) -> BTreeSet<Role> {
    user.roles.iter().filter_map(|r| r.parse().ok()).collect()
}

// =============================================================================
// Areas
// =============================================================================

/// Console sections gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Dashboard,
    Connectors,
    Routes,
    Statistics,
    Users,
    Groups,
}

impl Area {
    pub fn all() -> Vec<Area> {
        vec![
            Area::Dashboard,
            Area::Connectors,
            Area::Routes,
            Area::Statistics,
            Area::Users,
            Area::Groups,
        ]
    }

    /// Roles that may open this area
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Area::Dashboard => &[Role::Admin, Role::Manager, Role::User],
            Area::Connectors | Area::Routes | Area::Statistics => &[Role::Admin, Role::Manager],
            Area::Users | Area::Groups => &[Role::Admin],
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Area::Dashboard => write!(f, "dashboard"),
            Area::Connectors => write!(f, "connectors"),
            Area::Routes => write!(f, "routes"),
            Area::Statistics => write!(f, "statistics"),
            Area::Users => write!(f, "users"),
            Area::Groups => write!(f, "groups"),
        }
    }
}

// =============================================================================
// Checks
// =============================================================================

pub fn is_admin(user: &SessionUser) -> bool {
    user.has_role(&Role::Admin.to_string())
}

/// Whether the user holds any role allowed in `area`
pub fn can_access(user: &SessionUser, area: Area) -> bool {
    let roles = roles_of(user);
    area.allowed_roles().iter().any(|role| roles.contains(role))
}

/// Areas the user may open, in menu order
pub fn accessible_areas(user: &SessionUser) -> Vec<Area> {
    Area::all().into_iter().filter(|area| can_access(user, *area)).collect()
}

/// Union of the permissions of the groups a user belongs to
pub fn effective_permissions(user: &User, groups: &[Group]) -> PermissionMap {
    let mut merged = PermissionMap::new();
    for group in groups.iter().filter(|g| user.group_ids.contains(&g.id)) {
        for (resource, actions) in &group.permissions {
            merged
                .entry(resource.clone())
                .or_default()
                .extend(actions.iter().copied());
        }
    }
    merged
}

/// Admins may do anything; everyone else needs a group granting the action
pub fn has_permission(
    user: &SessionUser,
    permissions: &PermissionMap,
    resource: &str,
    action: GroupAction,
) -> bool {
    if is_admin(user) {
        return true;
    }
    permissions
        .get(resource)
        .is_some_and(|actions| actions.contains(&action))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_user(roles: &[&str]) -> SessionUser {
        SessionUser {
            id: "1".to_string(),
            username: "someone".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn group(id: &str, resource: &str, actions: &[GroupAction]) -> Group {
        let mut permissions = PermissionMap::new();
        permissions.insert(resource.to_string(), actions.iter().copied().collect());
        Group {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            member_count: 1,
            permissions,
        }
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_area_gating() {
        let admin = session_user(&["admin"]);
        let manager = session_user(&["manager"]);
        let user = session_user(&["user"]);
        let nobody = session_user(&["auditor"]);

        assert_eq!(accessible_areas(&admin), Area::all());
        assert_eq!(
            accessible_areas(&manager),
            vec![Area::Dashboard, Area::Connectors, Area::Routes, Area::Statistics]
        );
        assert_eq!(accessible_areas(&user), vec![Area::Dashboard]);
        assert!(accessible_areas(&nobody).is_empty());
        assert!(!can_access(&manager, Area::Users));
    }

    #[test]
    fn test_effective_permissions_merge_member_groups() {
        let groups = vec![
            group("ops", "routes", &[GroupAction::View]),
            group("eng", "routes", &[GroupAction::Update]),
            group("other", "users", &[GroupAction::Delete]),
        ];
        let user = User {
            id: "7".to_string(),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            first_name: None,
            last_name: None,
            roles: BTreeSet::new(),
            group_ids: ["ops".to_string(), "eng".to_string()].into_iter().collect(),
            is_active: true,
        };

        let permissions = effective_permissions(&user, &groups);
        let session = session_user(&["user"]);

        assert!(has_permission(&session, &permissions, "routes", GroupAction::View));
        assert!(has_permission(&session, &permissions, "routes", GroupAction::Update));
        assert!(!has_permission(&session, &permissions, "users", GroupAction::Delete));
        assert!(has_permission(&session_user(&["admin"]), &PermissionMap::new(), "users", GroupAction::Delete));
    }
}
