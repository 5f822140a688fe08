pub mod envelope;
pub mod forward;
pub mod normalize;
pub mod sanitize;

use axum::body::Bytes;

pub use envelope::ChatCompletionResponse;
pub use forward::{HttpTransport, UpstreamTransport};
pub use normalize::Normalized;

/// Sanitize, forward and normalize one request. Never fails: transport exhaustion
/// becomes diagnostic content.
pub async fn relay<T>(transport: &T, retry: u32, body: Bytes) -> Normalized
where
    T: UpstreamTransport + ?Sized,
{
    let body = sanitize::sanitize_body(body);
    match forward::forward(transport, body, retry).await {
        Ok(resp) => normalize::normalize(resp.status, &resp.body),
        Err(e) => Normalized::Content(format!("Upstream error: {}", e.last_failure())),
    }
}
