use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use fundboard_shared::auth::auth_middleware;
use fundboard_shared::config::AppConfig;
use fundboard_shared::http::{finish_router, ServiceState};
use fundboard_shared::identity::{HostedIdentityProvider, IdentityProvider};
use fundboard_shared::store::{dynamo::DynamoStore, AccountStore};
use log::info;
use std::sync::Arc;

use crate::handlers::account_handlers::{check_access, get_current_user, login, register_admin};

/// Creates a router backed by DynamoDB and the hosted identity provider.
pub async fn create_router(config: AppConfig) -> Router {
    info!("Creating account router with DynamoDB store");
    let store = Arc::new(DynamoStore::new(config.tables.clone()).await);
    let identity = Arc::new(HostedIdentityProvider::new(config.identity.clone()));
    create_router_with_state(ServiceState::new(store, identity, config))
}

pub fn create_router_with_state<S, I>(state: ServiceState<S, I>) -> Router
where
    S: AccountStore + 'static,
    I: IdentityProvider + 'static,
{
    let prefix = state.config.route_prefix.clone();
    info!("Setting up account routes with prefix: '{}'", prefix);

    let public_routes = Router::new()
        .route("/api/register", post(register_admin::<S, I>))
        .route("/api/login", post(login::<S, I>));

    let user_routes = Router::new()
        .route("/api/me", get(get_current_user::<S, I>))
        .route("/api/me/access", get(check_access::<S, I>))
        .layer(middleware::from_fn_with_state(
            state.identity.clone(),
            auth_middleware::<I>,
        ));

    let api_routes = public_routes.merge(user_routes).with_state(state);
    finish_router(api_routes, &prefix)
}
