pub mod handlers;
pub(crate) mod util;

use crate::config::Settings;
use crate::error::Result as AppResult;
use crate::http_client::client_for_url_with_timeout;
use crate::upstream::{HttpTransport, UpstreamTransport};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Settings,
    pub transport: Arc<dyn UpstreamTransport>,
}

pub fn create_app(config: Settings) -> AppResult<Router> {
    let url = config.upstream.chat_completions_url();
    let client = client_for_url_with_timeout(&url, config.upstream.timeout())?;
    let transport = Arc::new(HttpTransport::new(client, &config.upstream));

    tracing::info!(
        "Forwarding to {} (timeout={}s, retry={}, key={})",
        url,
        config.upstream.timeout_secs,
        config.upstream.retry,
        util::key_hint(&config.upstream.api_key)
    );

    Ok(router(AppState { config, transport }))
}

pub fn router(app_state: AppState) -> Router {
    handlers::routes()
        .with_state(Arc::new(app_state))
        // Request bodies are forwarded as-is, whatever their size.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
}
