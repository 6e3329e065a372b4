pub mod dynamo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Invitation, Organization, User};

/// Persistence for invitations.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    /// Inserts a new invitation, rejecting an id that already exists.
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation, StoreError>;

    async fn get_invitation(&self, id: &str) -> Result<Invitation, StoreError>;

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError>;

    async fn get_invitations_by_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Invitation>, StoreError>;

    /// Sets the status to REVOKED whatever it was before.
    async fn revoke_invitation(
        &self,
        id: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError>;

    /// Inserts `user` and moves the invitation from PENDING to ACCEPTED in
    /// one atomic write. Returns `StoreError::Conflict` when the invitation
    /// is no longer pending or the user id is taken; nothing is written then.
    ///
    /// The returned invitation is `invitation` marked as accepted. Nothing is
    /// read back once the write has committed.
    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user: User,
        accepted_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError>;
}

/// Persistence for organizations and user profiles.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts both rows atomically.
    async fn create_organization_with_admin(
        &self,
        organization: Organization,
        admin: User,
    ) -> Result<(Organization, User), StoreError>;

    async fn get_organization(&self, id: &str) -> Result<Organization, StoreError>;

    async fn get_user(&self, id: &str) -> Result<User, StoreError>;
}
