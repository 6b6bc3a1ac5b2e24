//! Fine-grained permissions checked by command handlers

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // global
    ManageAllTenants,
    ViewAllTenants,
    ManageSystemConfig,

    // tenant administration
    ManageTenant,
    ManageTenantUsers,
    ManageTenantRoles,

    // logistics
    ViewTenantData,
    EditSupplyGraph,
    EditProductionGraph,
    ManageInventory,
    AssignTasks,

    // members
    UploadScreenshots,
    AcceptTasks,
    ViewTasks,
    MakeRequests,
}

impl Permission {
    pub const ALL: [Permission; 15] = [
        Permission::ManageAllTenants,
        Permission::ViewAllTenants,
        Permission::ManageSystemConfig,
        Permission::ManageTenant,
        Permission::ManageTenantUsers,
        Permission::ManageTenantRoles,
        Permission::ViewTenantData,
        Permission::EditSupplyGraph,
        Permission::EditProductionGraph,
        Permission::ManageInventory,
        Permission::AssignTasks,
        Permission::UploadScreenshots,
        Permission::AcceptTasks,
        Permission::ViewTasks,
        Permission::MakeRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageAllTenants => "manage_all_tenants",
            Permission::ViewAllTenants => "view_all_tenants",
            Permission::ManageSystemConfig => "manage_system_config",
            Permission::ManageTenant => "manage_tenant",
            Permission::ManageTenantUsers => "manage_tenant_users",
            Permission::ManageTenantRoles => "manage_tenant_roles",
            Permission::ViewTenantData => "view_tenant_data",
            Permission::EditSupplyGraph => "edit_supply_graph",
            Permission::EditProductionGraph => "edit_production_graph",
            Permission::ManageInventory => "manage_inventory",
            Permission::AssignTasks => "assign_tasks",
            Permission::UploadScreenshots => "upload_screenshots",
            Permission::AcceptTasks => "accept_tasks",
            Permission::ViewTasks => "view_tasks",
            Permission::MakeRequests => "make_requests",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == needle)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
