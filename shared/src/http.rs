//! Router plumbing shared by the service binaries.

use std::{env, net::SocketAddr, sync::Arc};

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    middleware,
    middleware::Next,
    response::Response,
    Json, Router,
};
use log::{info, warn};
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::i18n::{localize_messages, MessageKey};

/// Clients every handler receives through `State`.
pub struct ServiceState<S, I> {
    pub store: Arc<S>,
    pub identity: Arc<I>,
    pub config: Arc<AppConfig>,
}

impl<S, I> ServiceState<S, I> {
    pub fn new(store: Arc<S>, identity: Arc<I>, config: AppConfig) -> Self {
        Self {
            store,
            identity,
            config: Arc::new(config),
        }
    }
}

impl<S, I> Clone for ServiceState<S, I> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            identity: self.identity.clone(),
            config: self.config.clone(),
        }
    }
}

/// Logs every request that reaches the router.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    info!(
        "Router received request: method={}, uri={}",
        req.method(),
        req.uri()
    );
    next.run(req).await
}

/// `Json` extractor whose rejection is a localized 400 instead of axum's
/// plain-text body. A body that is not JSON, or whose fields have the wrong
/// types, is reported as invalid; anything else as missing parameters.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!("Rejected request body: {}", rejection.body_text());
                let key = match rejection {
                    JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                        MessageKey::InvalidRequestBody
                    }
                    _ => MessageKey::MissingParameters,
                };
                Err(AppError::bad_request(key))
            }
        }
    }
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub async fn not_found(req: Request) -> AppError {
    warn!("No route matched for: {} {}", req.method(), req.uri());
    AppError::not_found(MessageKey::ResourceNotFound)
}

/// Mounts `api_routes` under `prefix` (if any) and wraps them in the
/// fallback, message localization, CORS and request logging.
pub fn finish_router(api_routes: Router, prefix: &str) -> Router {
    let router = if prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(prefix, api_routes)
    };

    info!("Router configured under prefix: '{}'", prefix);

    router
        .fallback(not_found)
        .layer(middleware::from_fn(localize_messages))
        .layer(cors_layer())
        .layer(middleware::from_fn(logging_middleware))
}

/// Runs under the Lambda runtime when deployed there, otherwise binds a
/// plain HTTP listener on `port`.
pub async fn serve(router: Router, port: u16) -> Result<(), lambda_http::Error> {
    if env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
        info!("Starting under the Lambda runtime");
        return lambda_http::run(router).await;
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
