use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Coarse-grained authorization role of a user inside its organization.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Treasurer,
    ProjectManager,
    Auditor,
    Member,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Treasurer,
        Role::ProjectManager,
        Role::Auditor,
        Role::Member,
    ];

    /// Position in the role hierarchy, higher outranks lower.
    pub fn rank(self) -> u8 {
        match self {
            Role::Admin => 4,
            Role::Treasurer => 3,
            Role::ProjectManager => 2,
            Role::Auditor => 1,
            Role::Member => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Treasurer => "TREASURER",
            Role::ProjectManager => "PROJECT_MANAGER",
            Role::Auditor => "AUDITOR",
            Role::Member => "MEMBER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// The team screen submits lowercase values, the stored rows use uppercase.
impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
