use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use fundboard_shared::auth::auth_middleware;
use fundboard_shared::config::AppConfig;
use fundboard_shared::http::{finish_router, ServiceState};
use fundboard_shared::identity::{HostedIdentityProvider, IdentityProvider};
use fundboard_shared::store::{dynamo::DynamoStore, AccountStore, InvitationStore};
use log::info;
use std::sync::Arc;

use crate::handlers::invitation_handlers::{
    accept_invitation, create_invitation, get_invitation_status, list_organization_invitations,
    revoke_invitation,
};

/// Creates a router backed by DynamoDB and the hosted identity provider.
pub async fn create_router(config: AppConfig) -> Router {
    info!("Creating invitation router with DynamoDB store");
    let store = Arc::new(DynamoStore::new(config.tables.clone()).await);
    let identity = Arc::new(HostedIdentityProvider::new(config.identity.clone()));
    create_router_with_state(ServiceState::new(store, identity, config))
}

/// Creates a router over the given clients.
pub fn create_router_with_state<S, I>(state: ServiceState<S, I>) -> Router
where
    S: InvitationStore + AccountStore + 'static,
    I: IdentityProvider + 'static,
{
    let prefix = state.config.route_prefix.clone();
    info!("Setting up invitation routes with prefix: '{}'", prefix);

    // Token holders act without an account, so these stay public.
    let public_routes = Router::new()
        .route("/api/invitations", post(create_invitation::<S, I>))
        .route("/api/invitations/revoke", post(revoke_invitation::<S, I>))
        .route(
            "/api/invitations/:token",
            get(get_invitation_status::<S, I>).post(accept_invitation::<S, I>),
        );

    let team_routes = Router::new()
        .route(
            "/api/organizations/:organization_id/invitations",
            get(list_organization_invitations::<S, I>),
        )
        .layer(middleware::from_fn_with_state(
            state.identity.clone(),
            auth_middleware::<I>,
        ));

    let api_routes = public_routes.merge(team_routes).with_state(state);
    finish_router(api_routes, &prefix)
}
