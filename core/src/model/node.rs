//! Supply and production graph nodes, owned by a single tenant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stockpile, depot or other location holding supplies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyNode {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub location: String,
    /// e.g. `stockpile`, `depot`, `frontline`
    pub node_type: String,
    pub inventory: serde_json::Value,
    pub desired_state: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSupplyNode {
    pub name: String,
    pub location: String,
    pub node_type: String,
}

impl NewSupplyNode {
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            node_type: node_type.into(),
        }
    }

    pub(crate) fn into_node(self, tenant_id: Uuid) -> SupplyNode {
        SupplyNode {
            id: Uuid::new_v4(),
            tenant_id,
            name: self.name,
            location: self.location,
            node_type: self.node_type,
            inventory: serde_json::json!({}),
            desired_state: serde_json::json!({}),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// A factory, refinery or other facility producing goods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionNode {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub location: String,
    /// e.g. `factory`, `refinery`, `mpf`
    pub facility_type: String,
    pub production_queue: serde_json::Value,
    pub capabilities: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProductionNode {
    pub name: String,
    pub location: String,
    pub facility_type: String,
}

impl NewProductionNode {
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        facility_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            facility_type: facility_type.into(),
        }
    }

    pub(crate) fn into_node(self, tenant_id: Uuid) -> ProductionNode {
        ProductionNode {
            id: Uuid::new_v4(),
            tenant_id,
            name: self.name,
            location: self.location,
            facility_type: self.facility_type,
            production_queue: serde_json::json!([]),
            capabilities: serde_json::json!({}),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
