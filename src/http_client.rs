use std::time::Duration;

use reqwest::ClientBuilder;

fn has_proxy_env() -> bool {
    [
        "HTTPS_PROXY",
        "https_proxy",
        "HTTP_PROXY",
        "http_proxy",
        "ALL_PROXY",
        "all_proxy",
    ]
    .iter()
    .any(|k| std::env::var(k).is_ok_and(|v| !v.trim().is_empty()))
}

// A local upstream (e.g. a sidecar model server) must not be routed through a system proxy.
fn should_bypass_proxy_impl(url: &str, proxy_env_present: bool) -> bool {
    if !proxy_env_present {
        return false;
    }

    let Ok(u) = reqwest::Url::parse(url) else {
        return false;
    };
    let Some(host) = u.host_str() else {
        return false;
    };

    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1") || host.ends_with(".localhost")
}

pub fn should_bypass_proxy_for_url(url: &str) -> bool {
    should_bypass_proxy_impl(url, has_proxy_env())
}

pub fn maybe_disable_proxy(builder: ClientBuilder, url: &str) -> ClientBuilder {
    if should_bypass_proxy_for_url(url) {
        builder.no_proxy()
    } else {
        builder
    }
}

/// Shared upstream client; `timeout` bounds each individual attempt.
pub fn client_for_url_with_timeout(
    url: &str,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let builder = reqwest::Client::builder().timeout(timeout);
    maybe_disable_proxy(builder, url).build()
}
