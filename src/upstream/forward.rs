use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;

use crate::config::UpstreamConfig;
use crate::error::ForwardError;

pub const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// A completed upstream exchange. Any status counts as completed.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// One attempt. `Err` only when no HTTP response was received.
    async fn post(&self, body: Bytes) -> Result<UpstreamResponse, ForwardError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, cfg: &UpstreamConfig) -> Self {
        Self {
            client,
            url: cfg.chat_completions_url(),
            api_key: cfg.api_key.clone(),
        }
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn post(&self, body: Bytes) -> Result<UpstreamResponse, ForwardError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = builder.send().await?;
        let status = resp.status();
        // The exchange already happened; a broken body is reported as empty rather than retried.
        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("failed to read upstream body (status {}): {}", status, e);
                Bytes::new()
            }
        };
        Ok(UpstreamResponse { status, body })
    }
}

/// Delay before the attempt following failed attempt `attempt` (0-indexed): 500ms × 2^attempt.
pub fn backoff_delay(attempt: u32) -> Duration {
    let pow = 1u32 << attempt.min(20);
    BASE_BACKOFF.saturating_mul(pow)
}

/// Sends `body` up to `retry + 1` times, sleeping between transport failures only.
pub async fn forward<T>(
    transport: &T,
    body: Bytes,
    retry: u32,
) -> Result<UpstreamResponse, ForwardError>
where
    T: UpstreamTransport + ?Sized,
{
    let attempts = retry.saturating_add(1);
    let mut last = String::new();

    for attempt in 0..attempts {
        match transport.post(body.clone()).await {
            Ok(resp) => {
                tracing::debug!(status = %resp.status, attempt = attempt + 1, "upstream responded");
                return Ok(resp);
            }
            Err(e) => {
                tracing::warn!(
                    "Upstream request failed (attempt {}/{}): {}",
                    attempt + 1,
                    attempts,
                    e
                );
                last = e.last_failure().to_string();
                if attempt + 1 < attempts {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }

    tracing::error!("upstream unreachable after {} attempts: {}", attempts, last);
    Err(ForwardError::Exhausted { attempts, last })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays a fixed script of outcomes and records when each attempt started.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<UpstreamResponse, ForwardError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<UpstreamResponse, ForwardError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UpstreamTransport for ScriptedTransport {
        async fn post(&self, _body: Bytes) -> Result<UpstreamResponse, ForwardError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ForwardError::Transport("script exhausted".into())))
        }
    }

    fn fail(msg: &str) -> Result<UpstreamResponse, ForwardError> {
        Err(ForwardError::Transport(msg.to_string()))
    }

    fn ok(status: StatusCode, body: &'static str) -> Result<UpstreamResponse, ForwardError> {
        Ok(UpstreamResponse {
            status,
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    #[test]
    fn backoff_doubles_from_500ms() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(5), Duration::from_millis(16_000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_sleep_between_attempts_only() {
        let transport = ScriptedTransport::new(vec![
            fail("connection refused"),
            fail("connection reset"),
            fail("operation timed out"),
        ]);

        let err = forward(&transport, Bytes::from_static(b"{}"), 2)
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 3);
        assert_eq!(
            transport.gaps(),
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
        match err {
            ForwardError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "operation timed out");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_delay_after_final_attempt() {
        let transport = ScriptedTransport::new(vec![fail("a"), fail("b")]);
        let start = Instant::now();
        let _ = forward(&transport, Bytes::new(), 1).await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let transport = ScriptedTransport::new(vec![fail("refused")]);
        let start = Instant::now();
        let err = forward(&transport, Bytes::new(), 0).await.unwrap_err();
        assert_eq!(transport.call_count(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(err.last_failure(), "refused");
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let transport = ScriptedTransport::new(vec![
            fail("refused"),
            ok(StatusCode::OK, r#"{"output_text":"hi"}"#),
        ]);
        let resp = forward(&transport, Bytes::new(), 2).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_is_not_retried() {
        let transport = ScriptedTransport::new(vec![
            ok(StatusCode::SERVICE_UNAVAILABLE, ""),
            ok(StatusCode::OK, "unused"),
        ]);
        let resp = forward(&transport, Bytes::new(), 2).await.unwrap();
        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(resp.body.is_empty());
        assert_eq!(transport.call_count(), 1);
    }
}
