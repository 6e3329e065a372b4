//! Role hierarchy and the static per-role permission matrix.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{Role, User};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Transactions,
    Projects,
    Reports,
    Audit,
    CashAccounts,
    Resources,
    Team,
    Settings,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('-', "_");
        match name.as_str() {
            "transactions" => Ok(Resource::Transactions),
            "projects" => Ok(Resource::Projects),
            "reports" => Ok(Resource::Reports),
            "audit" => Ok(Resource::Audit),
            "cash_accounts" => Ok(Resource::CashAccounts),
            "resources" => Ok(Resource::Resources),
            "team" => Ok(Resource::Team),
            "settings" => Ok(Resource::Settings),
            _ => Err(format!("unknown resource: {}", s)),
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Action::Read),
            "write" => Ok(Action::Write),
            "delete" => Ok(Action::Delete),
            _ => Err(format!("unknown action: {}", s)),
        }
    }
}

/// True when `actual` ranks at or above `required`.
pub fn has_permission(actual: Role, required: Role) -> bool {
    actual.rank() >= required.rank()
}

const PROJECT_MANAGER_RESOURCES: &[Resource] =
    &[Resource::Transactions, Resource::Projects, Resource::Reports];
const AUDITOR_RESOURCES: &[Resource] = &[
    Resource::Transactions,
    Resource::Reports,
    Resource::Audit,
];
const MEMBER_RESOURCES: &[Resource] = &[Resource::Transactions];

pub fn role_can_access(role: Role, resource: Resource, action: Action) -> bool {
    match role {
        Role::Admin | Role::Treasurer => true,
        Role::ProjectManager => {
            PROJECT_MANAGER_RESOURCES.contains(&resource)
                && matches!(action, Action::Read | Action::Write)
        }
        Role::Auditor => AUDITOR_RESOURCES.contains(&resource) && action == Action::Read,
        Role::Member => MEMBER_RESOURCES.contains(&resource) && action == Action::Read,
    }
}

/// Deactivated accounts are denied everything.
pub fn can_access(user: &User, resource: Resource, action: Action) -> bool {
    user.is_active && role_can_access(user.role, resource, action)
}
