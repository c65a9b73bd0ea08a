//! Role-based routing
//!
//! Marketplace users have exactly one role. The role decides the dashboard
//! a user lands on and which guarded routes they may open.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Route unauthenticated users are sent to.
pub const LOGIN_ROUTE: &str = "/login";

/// Marketplace user roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Groomer,
    Veterinarian,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Groomer => "groomer",
            Role::Veterinarian => "veterinarian",
            Role::Admin => "admin",
        }
    }

    /// Landing route after sign-in.
    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Role::Owner => "/owner/dashboard",
            Role::Groomer => "/groomer/dashboard",
            Role::Veterinarian => "/vet/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" | "pet_owner" => Ok(Role::Owner),
            "groomer" => Ok(Role::Groomer),
            "veterinarian" | "vet" => Ok(Role::Veterinarian),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Auth state as seen by a route guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Session {
    /// Auth state not resolved yet.
    Loading,
    SignedOut,
    SignedIn { user_id: String, role: Role },
}

/// What a guard decided for a navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "route", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Wait for auth to resolve before rendering.
    Loading,
    Allow,
    Redirect(String),
}

/// Restricts a route to a set of roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    allowed: Vec<Role>,
}

impl RouteGuard {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Any signed-in user.
    pub fn any_role() -> Self {
        Self::new([Role::Owner, Role::Groomer, Role::Veterinarian, Role::Admin])
    }

    /// Signed-out users go to login; users with another role go to their
    /// own dashboard.
    pub fn check(&self, session: &Session) -> GuardDecision {
        match session {
            Session::Loading => GuardDecision::Loading,
            Session::SignedOut => GuardDecision::Redirect(LOGIN_ROUTE.to_string()),
            Session::SignedIn { role, .. } if self.allowed.contains(role) => GuardDecision::Allow,
            Session::SignedIn { role, .. } => {
                GuardDecision::Redirect(role.dashboard_route().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(role: Role) -> Session {
        Session::SignedIn {
            user_id: "u-1".to_string(),
            role,
        }
    }

    #[test]
    fn test_dashboard_routes() {
        assert_eq!(Role::Owner.dashboard_route(), "/owner/dashboard");
        assert_eq!(Role::Groomer.dashboard_route(), "/groomer/dashboard");
        assert_eq!(Role::Veterinarian.dashboard_route(), "/vet/dashboard");
        assert_eq!(Role::Admin.dashboard_route(), "/admin/dashboard");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Vet".parse::<Role>().unwrap(), Role::Veterinarian);
        assert_eq!("pet_owner".parse::<Role>().unwrap(), Role::Owner);
        assert!("breeder".parse::<Role>().is_err());
    }

    #[test]
    fn test_guard_decisions() {
        let admin_only = RouteGuard::new([Role::Admin]);
        assert_eq!(admin_only.check(&Session::Loading), GuardDecision::Loading);
        assert_eq!(
            admin_only.check(&Session::SignedOut),
            GuardDecision::Redirect("/login".to_string())
        );
        assert_eq!(admin_only.check(&signed_in(Role::Admin)), GuardDecision::Allow);
        assert_eq!(
            admin_only.check(&signed_in(Role::Groomer)),
            GuardDecision::Redirect("/groomer/dashboard".to_string())
        );
        assert_eq!(RouteGuard::any_role().check(&signed_in(Role::Owner)), GuardDecision::Allow);
    }
}
