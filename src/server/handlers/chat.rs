use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::server::AppState;
use crate::upstream::{ChatCompletionResponse, Normalized, relay};

/// Always answers; upstream trouble is reported inside the envelope with status 200.
pub async fn chat_completions(State(app_state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    async move {
        tracing::info!(bytes = body.len(), "chat completion request");
        let upstream = &app_state.config.upstream;
        match relay(app_state.transport.as_ref(), upstream.retry, body).await {
            Normalized::Passthrough { status, body } => {
                tracing::info!(%status, "passing upstream choices through");
                (status, Json(body)).into_response()
            }
            Normalized::Content(content) => {
                let resp = ChatCompletionResponse::from_content(&upstream.model_label, content);
                (StatusCode::OK, Json(resp)).into_response()
            }
        }
    }
    .instrument(span)
    .await
}
