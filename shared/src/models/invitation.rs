use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use uuid::Uuid;

use super::Role;

/// Random bytes behind every invitation token (256 bits).
pub const TOKEN_BYTES: usize = 32;
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;
pub const MAX_EXPIRY_DAYS: i64 = 365;

/// Stored status. Accepted and revoked are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Revoked => "REVOKED",
        }
    }
}

/// Status as seen at a given instant. `Expired` is derived from
/// `expires_at` and never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationState {
    Pending,
    Accepted,
    Revoked,
    Expired,
}

impl From<InvitationStatus> for InvitationState {
    fn from(status: InvitationStatus) -> Self {
        match status {
            InvitationStatus::Pending => InvitationState::Pending,
            InvitationStatus::Accepted => InvitationState::Accepted,
            InvitationStatus::Revoked => InvitationState::Revoked,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Invitation {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub organization_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    pub invited_by_user_id: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    /// Builds a fresh PENDING invitation expiring `expires_in` after `now`.
    pub fn new(
        email: String,
        role: Role,
        organization_id: String,
        invited_by_user_id: String,
        expires_in: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            role,
            organization_id,
            token: generate_invitation_token(),
            expires_at: now + expires_in,
            accepted_at: None,
            invited_by_user_id,
            status: InvitationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Expiry wins over whatever status is stored.
    pub fn state_at(&self, now: DateTime<Utc>) -> InvitationState {
        if self.is_expired_at(now) {
            InvitationState::Expired
        } else {
            self.status.into()
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == InvitationState::Pending
    }

    pub fn is_addressed_to(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    pub fn mark_accepted(&mut self, now: DateTime<Utc>) {
        self.status = InvitationStatus::Accepted;
        self.accepted_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_revoked(&mut self, now: DateTime<Utc>) {
        self.status = InvitationStatus::Revoked;
        self.updated_at = now;
    }

    pub fn link(&self, app_base_url: &str) -> String {
        format!(
            "{}/register?token={}",
            app_base_url.trim_end_matches('/'),
            self.token
        )
    }
}

/// 256 bits from the OS CSPRNG, lowercase hex.
pub fn generate_invitation_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .fold(String::with_capacity(TOKEN_BYTES * 2), |mut out, byte| {
            let _ = write!(out, "{:02x}", byte);
            out
        })
}
