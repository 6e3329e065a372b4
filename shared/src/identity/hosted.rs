use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Identity, IdentityProvider, Session};
use crate::auth::decode_access_token;
use crate::config::IdentityConfig;
use crate::error::IdentityError;

/// Client for a hosted, GoTrue-compatible auth API.
#[derive(Debug, Clone)]
pub struct HostedIdentityProvider {
    client: Client,
    config: IdentityConfig,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: Identity,
}

/// The provider answers with `msg`, `message` or OAuth-style
/// `error_description` depending on the endpoint.
#[derive(Deserialize, Default)]
struct ProviderErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ProviderErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

impl HostedIdentityProvider {
    pub fn new(config: IdentityConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: IdentityConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url, path)
    }

    async fn error_from(response: Response) -> IdentityError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ProviderErrorBody>(&body)
            .ok()
            .and_then(ProviderErrorBody::into_message);

        if status.is_client_error() {
            IdentityError::Rejected(message.unwrap_or_else(|| status.to_string()))
        } else {
            error!("Identity provider returned {}: {}", status, body);
            IdentityError::UnexpectedResponse(format!("{} {}", status, body))
        }
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        debug!("Creating identity for {}", email);
        let response = self
            .client
            .post(self.endpoint("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        // Auto-confirming projects wrap the user in a session.
        let body: serde_json::Value = response.json().await?;
        let user = body
            .get("user")
            .filter(|user| user.is_object())
            .unwrap_or(&body);
        let identity: Identity = serde_json::from_value(user.clone()).map_err(|e| {
            IdentityError::UnexpectedResponse(format!("signup body: {}", e))
        })?;

        info!("Identity {} created for {}", identity.id, email);
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                warn!("Sign-in refused for {}", email);
                return Err(IdentityError::InvalidCredentials);
            }
            _ => return Err(Self::error_from(response).await),
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            IdentityError::UnexpectedResponse(format!("token body: {}", e))
        })?;

        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            identity: token.user,
        })
    }

    async fn verify_access_token(&self, access_token: &str) -> Result<Identity, IdentityError> {
        let claims = decode_access_token(access_token, &self.config.jwt_secret)?;
        Ok(Identity {
            id: claims.sub,
            email: claims.email,
        })
    }

    async fn delete_identity(&self, id: &str) -> Result<(), IdentityError> {
        let service_key = self
            .config
            .service_role_key
            .as_deref()
            .ok_or(IdentityError::NotConfigured("IDENTITY_SERVICE_ROLE_KEY"))?;

        let response = self
            .client
            .delete(self.endpoint(&format!("admin/users/{}", id)))
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!("Identity {} deleted", id);
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                warn!("Identity {} was already gone", id);
                Ok(())
            }
            _ => Err(Self::error_from(response).await),
        }
    }
}
