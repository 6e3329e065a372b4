use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};
use fundboard_shared::error::{AppError, IdentityError, Result, StoreError};
use fundboard_shared::http::{JsonBody, ServiceState};
use fundboard_shared::i18n::MessageKey;
use fundboard_shared::identity::{discard_identity, IdentityProvider};
use fundboard_shared::models::{now, Organization, Role, User};
use fundboard_shared::permissions::can_access;
use fundboard_shared::store::AccountStore;
use log::{debug, error, info, warn};

use crate::models::{
    AccessQuery, AccessResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};

/// Loads the caller's profile. A missing row means the identity was never
/// fully provisioned, which is a backend fault rather than a client one.
async fn load_profile<S>(store: &S, user_id: &str) -> Result<User>
where
    S: AccountStore + ?Sized,
{
    store.get_user(user_id).await.map_err(|e| match e {
        StoreError::NotFound(_) => {
            error!("Identity {} has no user profile", user_id);
            AppError::internal(MessageKey::UserNotFound)
        }
        other => AppError::from(other),
    })
}

// POST /api/register
pub async fn register_admin<S, I>(
    State(state): State<ServiceState<S, I>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)>
where
    S: AccountStore,
    I: IdentityProvider,
{
    let request = request.validate()?;

    let identity = state
        .identity
        .sign_up(&request.email, &request.password)
        .await
        .map_err(|e| match e {
            IdentityError::Rejected(message) => AppError::from(IdentityError::Rejected(message)),
            other => {
                error!("Identity creation failed: {}", other);
                AppError::internal(MessageKey::AccountCreationFailed)
            }
        })?;

    let created_at = now();
    let organization = Organization::new(request.organization_name, created_at);
    let admin = User::new(
        identity.id.clone(),
        request.email,
        request.first_name,
        request.last_name,
        Role::Admin,
        organization.id.clone(),
        created_at,
    );

    let (organization, admin) = match state
        .store
        .create_organization_with_admin(organization, admin)
        .await
    {
        Ok(created) => created,
        Err(e) => {
            error!("Failed to create organization for {}: {}", identity.id, e);
            discard_identity(state.identity.as_ref(), &identity.id).await;
            return Err(AppError::internal(MessageKey::OrganizationCreationFailed));
        }
    };

    info!(
        "Organization {} ({}) registered with admin {}",
        organization.id, organization.name, admin.id
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            organization_id: organization.id,
            user_id: admin.id,
        }),
    ))
}

// POST /api/login
pub async fn login<S, I>(
    State(state): State<ServiceState<S, I>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>>
where
    S: AccountStore,
    I: IdentityProvider,
{
    let (email, password) = request.validate()?;

    let session = state.identity.sign_in(&email, &password).await?;
    let user = load_profile(state.store.as_ref(), &session.identity.id).await?;
    debug!("User {} signed in", user.id);

    Ok(Json(LoginResponse {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        expires_in: session.expires_in,
        user,
    }))
}

// GET /api/me
pub async fn get_current_user<S, I>(
    State(state): State<ServiceState<S, I>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: AccountStore,
    I: IdentityProvider,
{
    let user = load_profile(state.store.as_ref(), &user_id).await?;
    Ok(Json(serde_json::json!({ "user": user })))
}

// GET /api/me/access?resource=..&action=..
pub async fn check_access<S, I>(
    State(state): State<ServiceState<S, I>>,
    Extension(user_id): Extension<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>>
where
    S: AccountStore,
    I: IdentityProvider,
{
    let (resource, action) = query.parse()?;
    let user = load_profile(state.store.as_ref(), &user_id).await?;

    let allowed = can_access(&user, resource, action);
    if !allowed {
        warn!(
            "User {} ({}) denied {:?} on {:?}",
            user.id, user.role, action, resource
        );
    }
    Ok(Json(AccessResponse { allowed }))
}
