use fundboard_shared::config::AppConfig;
use fundboard_shared::http::serve;
use log::{error, info};

mod handlers;
mod models;
mod routes;


const DEFAULT_PORT: u16 = 3001;

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting Account Service");

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    let port = config.port_or(DEFAULT_PORT);

    let app = routes::create_router(config).await;
    serve(app, port).await
}
