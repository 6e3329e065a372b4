use fundboard_shared::config::AppConfig;
use fundboard_shared::http::serve;
use log::{error, info};

mod handlers;
mod models;
mod routes;

#[cfg(test)]
mod tests;

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting Invitation Service");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    let port = config.port_or(DEFAULT_PORT);

    let app = routes::create_router(config).await;
    serve(app, port).await
}
