//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Default request timeout for remote inference calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Create a shared HTTP client with standard Iris configuration.
///
/// Config: 30s connect timeout, `timeout` request timeout, rustls TLS,
/// `iris/{version}` user-agent, redirect limit 10.
#[must_use]
pub fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .user_agent(concat!("iris/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("default HTTP client construction must not fail")
}

#[must_use]
pub fn default_client() -> reqwest::Client {
    client_with_timeout(DEFAULT_TIMEOUT)
}

/// Read an error body for logging, capped so a misbehaving endpoint cannot flood the logs.
pub(crate) async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body: String = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(500)
        .collect();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    }
}
