use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, IdentityError};
use crate::i18n::MessageKey;
use crate::identity::IdentityProvider;

/// Claims the identity provider signs into its access tokens.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<AccessClaims, IdentityError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| IdentityError::InvalidToken(e.to_string()))
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies the bearer token and exposes the caller's user id as an
/// `Extension<String>`.
pub async fn auth_middleware<I>(
    State(identity): State<Arc<I>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError>
where
    I: IdentityProvider + 'static,
{
    let token = bearer_token(req.headers())
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized(MessageKey::Unauthenticated))?;

    let verified = identity.verify_access_token(&token).await?;
    debug!("Authenticated request for user {}", verified.id);

    req.extensions_mut().insert(verified.id);
    Ok(next.run(req).await)
}
