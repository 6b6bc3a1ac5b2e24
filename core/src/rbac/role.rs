//! Role definitions and conversions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role levels in increasing order of privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular regiment member: takes tasks, uploads screenshots
    EndUser = 0,
    /// Runs the supply and production graphs
    LogisticsManager = 1,
    /// Manages the regiment and its members
    RegimentAdmin = 2,
    /// Global override across every tenant, never a membership role
    ServerAdmin = 3,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::EndUser,
        Role::LogisticsManager,
        Role::RegimentAdmin,
        Role::ServerAdmin,
    ];

    /// Get role level as integer
    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// Parse role from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "end_user" | "enduser" | "member" => Some(Role::EndUser),
            "logistics_manager" | "logisticsmanager" | "manager" => Some(Role::LogisticsManager),
            "regiment_admin" | "regimentadmin" | "admin" => Some(Role::RegimentAdmin),
            "server_admin" | "serveradmin" => Some(Role::ServerAdmin),
            _ => None,
        }
    }

    /// Get role name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::EndUser => "end_user",
            Role::LogisticsManager => "logistics_manager",
            Role::RegimentAdmin => "regiment_admin",
            Role::ServerAdmin => "server_admin",
        }
    }

    /// Human readable name for Discord replies
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::EndUser => "End User",
            Role::LogisticsManager => "Logistics Manager",
            Role::RegimentAdmin => "Regiment Admin",
            Role::ServerAdmin => "Server Admin",
        }
    }

    /// Whether the role may be stored on a tenant membership
    pub fn is_assignable(&self) -> bool {
        *self != Role::ServerAdmin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::EndUser < Role::LogisticsManager);
        assert!(Role::LogisticsManager < Role::RegimentAdmin);
        assert!(Role::RegimentAdmin < Role::ServerAdmin);
        assert!(Role::ServerAdmin >= Role::EndUser);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("end_user"), Some(Role::EndUser));
        assert_eq!(Role::from_str("END-USER"), Some(Role::EndUser));
        assert_eq!(Role::from_str("logistics_manager"), Some(Role::LogisticsManager));
        assert_eq!(Role::from_str("admin"), Some(Role::RegimentAdmin));
        assert_eq!(Role::from_str("server_admin"), Some(Role::ServerAdmin));
        assert_eq!(Role::from_str("general"), None);
    }

    #[test]
    fn test_role_roundtrip_names() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn test_only_server_admin_unassignable() {
        assert!(Role::EndUser.is_assignable());
        assert!(Role::RegimentAdmin.is_assignable());
        assert!(!Role::ServerAdmin.is_assignable());
    }
}
