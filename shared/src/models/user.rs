use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Application profile. `id` is the identity provider's user id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_active: bool,
    pub organization_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: String,
        email: String,
        first_name: String,
        last_name: String,
        role: Role,
        organization_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            first_name,
            last_name,
            role,
            avatar: None,
            is_active: true,
            organization_id,
            created_at: now,
            updated_at: now,
        }
    }
}
