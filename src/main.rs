mod config;
mod error;
mod http_client;
mod server;
mod upstream;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Settings::load()?;
    config.validate()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::create_app(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Shim listening on http://{}/v1/chat/completions", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
