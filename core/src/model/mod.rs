//! Persistent domain records

pub mod membership;
pub mod node;
pub mod task;
pub mod tenant;
pub mod user;

pub use membership::{MemberSummary, Membership};
pub use node::{NewProductionNode, NewSupplyNode, ProductionNode, SupplyNode};
pub use task::{LogisticsTask, NewLogisticsTask, TaskStatus};
pub use tenant::{Faction, NewTenant, TenantRecord, validate_slug};
pub use user::{NewUser, User};
