pub mod hosted;

use async_trait::async_trait;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

pub use hosted::HostedIdentityProvider;

/// Authentication record held by the external provider. Its id is reused
/// as the `users` row id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub identity: Identity,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Resolves the identity behind an access token.
    async fn verify_access_token(&self, access_token: &str) -> Result<Identity, IdentityError>;

    async fn delete_identity(&self, id: &str) -> Result<(), IdentityError>;
}

/// Compensating step for a failed multi-step write: removes an identity
/// that no longer has a profile row. A failure is only logged, the caller
/// still reports the error that triggered the rollback.
pub async fn discard_identity<I>(identity: &I, id: &str)
where
    I: IdentityProvider + ?Sized,
{
    match identity.delete_identity(id).await {
        Ok(()) => warn!("Rolled back identity {}", id),
        Err(e) => error!(
            "Failed to roll back identity {}, it is now orphaned: {}",
            id, e
        ),
    }
}
