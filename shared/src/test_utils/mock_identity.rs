use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use log::debug;
use uuid::Uuid;

use crate::auth::{decode_access_token, AccessClaims};
use crate::error::IdentityError;
use crate::identity::{Identity, IdentityProvider, Session};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    id: String,
    email: String,
    password: String,
}

/// Identity provider double. Issues real HS256 tokens signed with
/// [`TEST_JWT_SECRET`] and remembers which identities were deleted.
#[derive(Default)]
pub struct MockIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    deleted: Mutex<Vec<String>>,
    fail_sign_up: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `sign_up` fail as if the provider were unreachable.
    pub fn fail_sign_up(&self, fail: bool) {
        self.fail_sign_up.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn identity_count(&self) -> usize {
        self.accounts.lock().map(|a| a.len()).unwrap_or_default()
    }

    pub fn has_identity(&self, email: &str) -> bool {
        self.accounts
            .lock()
            .map(|a| a.contains_key(&email.to_lowercase()))
            .unwrap_or(false)
    }

    pub fn identity_id(&self, email: &str) -> Option<String> {
        self.accounts
            .lock()
            .ok()
            .and_then(|accounts| {
                accounts
                    .get(&email.to_lowercase())
                    .map(|account| account.id.clone())
            })
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Signs an access token for `user_id` without going through sign-in.
    pub fn issue_token(&self, user_id: &str, email: Option<&str>) -> String {
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("failed to sign test token")
    }

    fn lock_accounts(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Account>>, IdentityError> {
        self.accounts
            .lock()
            .map_err(|_| IdentityError::Transport("mock provider poisoned".into()))
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        if self.fail_sign_up.load(Ordering::SeqCst) {
            return Err(IdentityError::Transport(
                "injected sign-up failure".to_string(),
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Rejected(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut accounts = self.lock_accounts()?;
        let key = email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(IdentityError::Rejected(
                "User already registered".to_string(),
            ));
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let identity = Identity {
            id: account.id.clone(),
            email: Some(account.email.clone()),
        };
        debug!(
            "Mock provider created identity {} for {}",
            identity.id, email
        );
        accounts.insert(key, account);
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let identity = {
            let accounts = self.lock_accounts()?;
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => Identity {
                    id: account.id.clone(),
                    email: Some(account.email.clone()),
                },
                _ => return Err(IdentityError::InvalidCredentials),
            }
        };

        Ok(Session {
            access_token: self.issue_token(&identity.id, identity.email.as_deref()),
            refresh_token: Uuid::new_v4().to_string(),
            expires_in: 3600,
            identity,
        })
    }

    async fn verify_access_token(&self, access_token: &str) -> Result<Identity, IdentityError> {
        let claims = decode_access_token(access_token, TEST_JWT_SECRET)?;
        Ok(Identity {
            id: claims.sub,
            email: claims.email,
        })
    }

    async fn delete_identity(&self, id: &str) -> Result<(), IdentityError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(IdentityError::Transport(
                "injected delete failure".to_string(),
            ));
        }
        self.lock_accounts()?.retain(|_, account| account.id != id);
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(id.to_string());
        }
        Ok(())
    }
}
