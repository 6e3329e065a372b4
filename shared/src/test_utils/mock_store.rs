use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::{Invitation, InvitationStatus, Organization, User};
use crate::store::{AccountStore, InvitationStore};

/// In-memory store with the same conditional-write semantics as the
/// DynamoDB tables. `fail_writes(true)` makes every write a backend error.
#[derive(Default)]
pub struct MockStore {
    invitations: RwLock<HashMap<String, Invitation>>,
    users: RwLock<HashMap<String, User>>,
    organizations: RwLock<HashMap<String, Organization>>,
    fail_writes: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Database("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }

    /// Seeds a profile row directly, bypassing the registration flow.
    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Seeds or overwrites an invitation as-is.
    pub async fn insert_invitation(&self, invitation: Invitation) {
        self.invitations
            .write()
            .await
            .insert(invitation.id.clone(), invitation);
    }

    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }

    pub async fn organizations(&self) -> Vec<Organization> {
        self.organizations.read().await.values().cloned().collect()
    }

    pub async fn invitations(&self) -> Vec<Invitation> {
        self.invitations.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl InvitationStore for MockStore {
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation, StoreError> {
        self.check_writable()?;
        let mut invitations = self.invitations.write().await;
        if invitations.contains_key(&invitation.id) {
            return Err(StoreError::Conflict(format!(
                "invitation {} already exists",
                invitation.id
            )));
        }
        debug!("Mock store saving invitation {}", invitation.id);
        invitations.insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn get_invitation(&self, id: &str) -> Result<Invitation, StoreError> {
        self.invitations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("invitation {}", id)))
    }

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError> {
        self.invitations
            .read()
            .await
            .values()
            .find(|invitation| invitation.token == token)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("invitation for token".to_string()))
    }

    async fn get_invitations_by_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Invitation>, StoreError> {
        Ok(self
            .invitations
            .read()
            .await
            .values()
            .filter(|invitation| invitation.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn revoke_invitation(
        &self,
        id: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError> {
        self.check_writable()?;
        let mut invitations = self.invitations.write().await;
        let invitation = invitations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("invitation {}", id)))?;
        invitation.mark_revoked(revoked_at);
        Ok(invitation.clone())
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user: User,
        accepted_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError> {
        self.check_writable()?;
        let mut invitations = self.invitations.write().await;
        let mut users = self.users.write().await;

        let stored = invitations
            .get_mut(&invitation.id)
            .ok_or_else(|| {
                StoreError::NotFound(format!("invitation {}", invitation.id))
            })?;
        if stored.status != InvitationStatus::Pending || users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!(
                "invitation {} is no longer pending or user {} exists",
                invitation.id, user.id
            )));
        }

        stored.mark_accepted(accepted_at);
        users.insert(user.id.clone(), user);

        let mut accepted = invitation.clone();
        accepted.mark_accepted(accepted_at);
        Ok(accepted)
    }
}

#[async_trait]
impl AccountStore for MockStore {
    async fn create_organization_with_admin(
        &self,
        organization: Organization,
        admin: User,
    ) -> Result<(Organization, User), StoreError> {
        self.check_writable()?;
        let mut organizations = self.organizations.write().await;
        let mut users = self.users.write().await;

        if organizations.contains_key(&organization.id) || users.contains_key(&admin.id) {
            return Err(StoreError::Conflict(format!(
                "organization {} or user {} already exists",
                organization.id, admin.id
            )));
        }

        organizations.insert(organization.id.clone(), organization.clone());
        users.insert(admin.id.clone(), admin.clone());
        Ok((organization, admin))
    }

    async fn get_organization(&self, id: &str) -> Result<Organization, StoreError> {
        self.organizations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("organization {}", id)))
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }
}
