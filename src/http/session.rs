//! HTTP session with a fixed per-attempt timeout, bounded retries and
//! fail-on-non-2xx semantics.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::Client;
use std::fmt;
use std::str::FromStr;

use super::policy::SessionPolicy;

/// HTTP methods understood by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "PATCH" => Ok(HttpMethod::Patch),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => anyhow::bail!("Unsupported HTTP method: {}", other),
        }
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The final response, after all retries, had a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.body)
    }
}

impl std::error::Error for HttpStatusError {}

/// The request never produced a response (connect failure, timeout, reset).
#[derive(Debug)]
pub struct TransportError {
    pub attempts: u32,
    source: reqwest::Error,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        self.source.is_timeout()
    }

    pub fn is_connect(&self) -> bool {
        self.source.is_connect()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request failed after {} attempt(s): {}",
            self.attempts, self.source
        )
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// HTTP session applying a [`SessionPolicy`] to every request.
#[derive(Clone)]
pub struct ResilientSession {
    client: Client,
    policy: SessionPolicy,
}

impl ResilientSession {
    /// Creates a session with a freshly built reqwest Client.
    pub fn new(policy: SessionPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("bls-fetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, policy))
    }

    /// Creates a session wrapping an existing reqwest Client.
    pub fn with_client(client: Client, policy: SessionPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Sends a request, retrying transient failures per the session policy.
    ///
    /// Returns the final response when it is 2xx. A final non-2xx status yields
    /// [`HttpStatusError`], and a request that never got a response yields
    /// [`TransportError`]. `Retry-After` headers are ignored.
    #[tracing::instrument(skip(self, headers, body))]
    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse> {
        let max_retries = self.policy.max_retries();
        let mut retries = 0;

        loop {
            let attempt = retries + 1;
            debug!("{} {} (attempt {}/{})...", method, url, attempt, max_retries + 1);

            match self.send_once(method, url, headers, body).await {
                Ok(response) => {
                    if retries < max_retries
                        && self.policy.should_retry_status(method, response.status)
                    {
                        retries += 1;
                        let delay = self.policy.backoff(retries);
                        warn!(
                            "{} {}: attempt {}/{} returned HTTP {}, retrying in {}ms...",
                            method,
                            url,
                            attempt,
                            max_retries + 1,
                            response.status,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if !response.is_success() {
                        debug!("{} {}: final status {}", method, url, response.status);
                        return Err(HttpStatusError {
                            status: response.status,
                            body: response.body,
                        }
                        .into());
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if retries < max_retries && self.policy.should_retry_transport(method) {
                        retries += 1;
                        let delay = self.policy.backoff(retries);
                        warn!(
                            "{} {}: attempt {}/{} failed ({}), retrying in {}ms...",
                            method,
                            url,
                            attempt,
                            max_retries + 1,
                            e,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(TransportError {
                        attempts: attempt,
                        source: e,
                    }
                    .into());
                }
            }
        }
    }

    /// Single attempt, reading the whole body.
    async fn send_once(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse, reqwest::Error> {
        let mut request = self
            .client
            .request(method.to_reqwest(), url)
            .timeout(self.policy.timeout());

        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn session(max_retries: i64) -> ResilientSession {
        ResilientSession::new(SessionPolicy::from_secs(5, max_retries).unwrap()).unwrap()
    }

    #[test]
    fn test_http_method_round_trip() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert!("BREW".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_raw_response_header_lookup() {
        let response = RawResponse {
            status: 204,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: String::new(),
        };
        assert!(response.is_success());
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[tokio::test]
    async fn test_send_success_first_try() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/data")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(serde_json::json!({"seriesid": ["A"]})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;

        let body = serde_json::json!({"seriesid": ["A"]});
        let response = session(3)
            .send(
                HttpMethod::Post,
                &format!("{}/data", server.url()),
                &[("Content-type", "application/json")],
                Some(&body),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"ok":true}"#);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test_log::test(tokio::test)]
    async fn test_send_retries_then_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/data")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/data")
            .with_status(200)
            .with_body("done")
            .expect(1)
            .create_async()
            .await;

        let response = session(3)
            .send(HttpMethod::Post, &format!("{}/data", server.url()), &[], None)
            .await
            .unwrap();

        failing.assert_async().await;
        ok.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "done");
    }

    #[tokio::test]
    async fn test_send_exhausts_retries_then_fails_on_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/data")
            .with_status(500)
            .with_body("boom")
            .expect(4)
            .create_async()
            .await;

        let err = session(3)
            .send(HttpMethod::Post, &format!("{}/data", server.url()), &[], None)
            .await
            .unwrap_err();

        mock.assert_async().await;
        let status_err = err.downcast_ref::<HttpStatusError>().unwrap();
        assert_eq!(status_err.status, 500);
        assert_eq!(status_err.body, "boom");
    }

    #[tokio::test]
    async fn test_send_does_not_retry_unlisted_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let err = session(3)
            .send(HttpMethod::Get, &format!("{}/missing", server.url()), &[], None)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.downcast_ref::<HttpStatusError>().unwrap().status, 404);
    }

    #[tokio::test]
    async fn test_send_does_not_retry_unlisted_method() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/data")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let policy = SessionPolicy::new(
            Duration::from_secs(5),
            3,
            None,
            Some([HttpMethod::Get].into_iter().collect()),
        )
        .unwrap();
        let err = ResilientSession::new(policy)
            .unwrap()
            .send(HttpMethod::Post, &format!("{}/data", server.url()), &[], None)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.downcast_ref::<HttpStatusError>().unwrap().status, 503);
    }

    #[tokio::test]
    async fn test_send_ignores_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let throttled = server
            .mock("GET", "/data")
            .with_status(429)
            .with_header("retry-after", "3600")
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/data")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let started = std::time::Instant::now();
        let response = session(1)
            .send(HttpMethod::Get, &format!("{}/data", server.url()), &[], None)
            .await
            .unwrap();

        throttled.assert_async().await;
        ok.assert_async().await;
        assert_eq!(response.status, 200);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test_log::test(tokio::test)]
    async fn test_send_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = session(1)
            .send(HttpMethod::Get, &format!("http://{}/", addr), &[], None)
            .await
            .unwrap_err();

        let transport = err.downcast_ref::<TransportError>().unwrap();
        assert_eq!(transport.attempts, 2);
        assert!(transport.is_connect());
        assert!(transport.to_string().contains("2 attempt"));
    }

    #[tokio::test]
    async fn test_send_timeout_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let policy = SessionPolicy::new(Duration::from_millis(200), 0, None, None).unwrap();
        let err = ResilientSession::new(policy)
            .unwrap()
            .send(HttpMethod::Get, &format!("http://{}/", addr), &[], None)
            .await
            .unwrap_err();

        let transport = err.downcast_ref::<TransportError>().unwrap();
        assert_eq!(transport.attempts, 1);
        assert!(transport.is_timeout());
    }
}
