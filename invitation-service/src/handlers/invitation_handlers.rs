use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use fundboard_shared::error::{AppError, IdentityError, Result, StoreError};
use fundboard_shared::http::{JsonBody, ServiceState};
use fundboard_shared::i18n::MessageKey;
use fundboard_shared::identity::{discard_identity, IdentityProvider};
use fundboard_shared::models::{now, Invitation, InvitationState, Role, User};
use fundboard_shared::permissions::has_permission;
use fundboard_shared::store::{AccountStore, InvitationStore};
use log::{debug, error, info, warn};

use crate::models::{
    AcceptInvitationRequest, CreateInvitationRequest, CreateInvitationResponse,
    InvitationStatusResponse, InvitationSummary, RevokeInvitationRequest, RevokeTarget,
    SuccessResponse,
};

/// Minimum role that may list an organization's invitations.
const LIST_INVITATIONS_ROLE: Role = Role::Treasurer;

/// Token lookups answer 404 with the invitation-specific message; any
/// other store failure is a backend error.
async fn find_by_token<S>(store: &S, token: &str) -> Result<Invitation>
where
    S: InvitationStore + ?Sized,
{
    store
        .get_invitation_by_token(token)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => {
                warn!("No invitation matches the presented token");
                AppError::not_found(MessageKey::InvitationNotFound)
            }
            other => AppError::from(other),
        })
}

// POST /api/invitations
pub async fn create_invitation<S, I>(
    State(state): State<ServiceState<S, I>>,
    JsonBody(request): JsonBody<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<CreateInvitationResponse>)>
where
    S: InvitationStore + AccountStore,
    I: IdentityProvider,
{
    let request = request.validate(state.config.invitation_expiry_days)?;
    let now = now();

    // Best-effort: two concurrent creates can both pass this check.
    let existing = state
        .store
        .get_invitations_by_organization(&request.organization_id)
        .await?;
    if existing
        .iter()
        .any(|inv| {
            inv.is_addressed_to(&request.email) && inv.is_valid_at(now)
        })
    {
        warn!(
            "Pending invitation already exists for {} in organization {}",
            request.email, request.organization_id
        );
        return Err(AppError::conflict(MessageKey::InvitationAlreadyPending));
    }

    let invitation = Invitation::new(
        request.email,
        request.role,
        request.organization_id,
        request.invited_by_user_id,
        request.expires_in,
        now,
    );

    let invitation = state
        .store
        .create_invitation(invitation)
        .await
        .map_err(|e| {
            error!("Failed to store invitation: {}", e);
            AppError::internal(MessageKey::InvitationCreationFailed)
        })?;

    info!(
        "Invitation {} created for {} as {} in organization {}",
        invitation.id, invitation.email, invitation.role, invitation.organization_id
    );

    let link = invitation.link(&state.config.app_base_url);
    Ok((
        StatusCode::CREATED,
        Json(CreateInvitationResponse { invitation, link }),
    ))
}

// GET /api/invitations/:token
pub async fn get_invitation_status<S, I>(
    State(state): State<ServiceState<S, I>>,
    Path(token): Path<String>,
) -> Result<Json<InvitationStatusResponse>>
where
    S: InvitationStore + AccountStore,
    I: IdentityProvider,
{
    let invitation = find_by_token(state.store.as_ref(), &token).await?;
    let current = invitation.state_at(now());
    debug!("Invitation {} is {:?}", invitation.id, current);

    Ok(Json(if current == InvitationState::Pending {
        InvitationStatusResponse {
            valid: true,
            reason: None,
            invitation: Some(invitation),
        }
    } else {
        InvitationStatusResponse {
            valid: false,
            reason: Some(current),
            invitation: None,
        }
    }))
}

// POST /api/invitations/:token
pub async fn accept_invitation<S, I>(
    State(state): State<ServiceState<S, I>>,
    Path(token): Path<String>,
    JsonBody(request): JsonBody<AcceptInvitationRequest>,
) -> Result<Json<SuccessResponse>>
where
    S: InvitationStore + AccountStore,
    I: IdentityProvider,
{
    let request = request.validate()?;
    let invitation = find_by_token(state.store.as_ref(), &token).await?;

    let current = invitation.state_at(now());
    if current != InvitationState::Pending {
        warn!(
            "Refusing to accept invitation {} in state {:?}",
            invitation.id, current
        );
        return Err(AppError::bad_request(
            MessageKey::InvitationInvalidOrExpired,
        ));
    }
    if !invitation.is_addressed_to(&request.email) {
        warn!(
            "Invitation {} presented with a different email address",
            invitation.id
        );
        return Err(AppError::bad_request(MessageKey::InvitationEmailMismatch));
    }

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

    let accepted_at = now();
    let user = User::new(
        identity.id.clone(),
        request.email,
        request.first_name,
        request.last_name,
        invitation.role,
        invitation.organization_id.clone(),
        accepted_at,
    );

    if let Err(e) = state
        .store
        .accept_invitation(&invitation, user, accepted_at)
        .await
    {
        discard_identity(state.identity.as_ref(), &identity.id).await;
        return Err(match e {
            StoreError::Conflict(reason) => {
                warn!(
                    "Invitation {} lost an acceptance race: {}",
                    invitation.id, reason
                );
                AppError::bad_request(MessageKey::InvitationInvalidOrExpired)
            }
            other => {
                error!("Failed to accept invitation {}: {}", invitation.id, other);
                AppError::internal(MessageKey::ProfileCreationFailed)
            }
        });
    }

    info!(
        "Invitation {} accepted by user {} ({}) into organization {}",
        invitation.id, identity.id, invitation.role, invitation.organization_id
    );
    Ok(Json(SuccessResponse { success: true }))
}

// POST /api/invitations/revoke
pub async fn revoke_invitation<S, I>(
    State(state): State<ServiceState<S, I>>,
    JsonBody(request): JsonBody<RevokeInvitationRequest>,
) -> Result<Json<SuccessResponse>>
where
    S: InvitationStore + AccountStore,
    I: IdentityProvider,
{
    let id = match request.target()? {
        RevokeTarget::Id(id) => id,
        RevokeTarget::Token(token) => {
            find_by_token(state.store.as_ref(), &token).await?.id
        }
    };

    let revoked = state
        .store
        .revoke_invitation(&id, now())
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => {
                warn!("Revocation target {} does not exist", id);
                AppError::not_found(MessageKey::InvitationNotFound)
            }
            other => {
                error!("Failed to revoke invitation {}: {}", id, other);
                AppError::internal(MessageKey::RevocationFailed)
            }
        })?;

    info!("Invitation {} revoked", revoked.id);
    Ok(Json(SuccessResponse { success: true }))
}

// GET /api/organizations/:organization_id/invitations
pub async fn list_organization_invitations<S, I>(
    State(state): State<ServiceState<S, I>>,
    Path(organization_id): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: InvitationStore + AccountStore,
    I: IdentityProvider,
{
    let caller = state.store.get_user(&user_id).await.map_err(|e| match e {
        StoreError::NotFound(_) => {
            warn!("Authenticated user {} has no profile", user_id);
            AppError::forbidden(MessageKey::Forbidden)
        }
        other => AppError::from(other),
    })?;

    if !caller.is_active
        || caller.organization_id != organization_id
        || !has_permission(caller.role, LIST_INVITATIONS_ROLE)
    {
        warn!(
            "User {} ({}) may not list invitations of organization {}",
            user_id, caller.role, organization_id
        );
        return Err(AppError::forbidden(MessageKey::Forbidden));
    }

    let now = now();
    let mut invitations = state
        .store
        .get_invitations_by_organization(&organization_id)
        .await?;
    invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let invitations: Vec<InvitationSummary> = invitations
        .into_iter()
        .map(|invitation| InvitationSummary {
            state: invitation.state_at(now),
            invitation,
        })
        .collect();

    Ok(Json(serde_json::json!({ "invitations": invitations })))
}
