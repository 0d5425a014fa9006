//! VerificationClient - Membership Verification Adapter
//!
//! ## Responsibilities
//!
//! - POST decoded QR payloads to the gym's verification endpoint
//! - Carry the CSRF token / session cookie
//! - Fold every failure into a `TransportFailure` outcome
//!
//! The controller never sees an error from this module: network problems,
//! unexpected statuses and malformed bodies all become outcomes.

mod types;

pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Header carrying the CSRF token
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for `health_check`, which backs `/healthz`
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Verification service contract used by the scan controller
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Validate one decoded payload
    async fn verify(&self, payload: &str) -> VerificationOutcome;
}

/// HTTP verifier for `POST /api/process-qr-scan/`
pub struct HttpVerifier {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    csrf_token: Option<String>,
    session_cookie: Option<String>,
}

impl HttpVerifier {
    /// Create new verifier
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create new verifier with custom timeout
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
            csrf_token: None,
            session_cookie: None,
        })
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_session_cookie(mut self, session_id: impl Into<String>) -> Self {
        self.session_cookie = Some(session_id.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check the endpoint is reachable (any HTTP answer counts)
    pub async fn health_check(&self) -> bool {
        let request = self
            .client
            .get(&self.endpoint)
            .timeout(HEALTH_CHECK_TIMEOUT.min(self.timeout));

        match request.send().await {
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "Verification endpoint reachable");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Verification endpoint unreachable");
                false
            }
        }
    }

    fn cookie_header(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(ref token) = self.csrf_token {
            parts.push(format!("csrftoken={}", token));
        }
        if let Some(ref session) = self.session_cookie {
            parts.push(format!("sessionid={}", session));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }

    async fn post(&self, payload: &str) -> std::result::Result<(u16, Vec<u8>), reqwest::Error> {
        let mut request = self.client.post(&self.endpoint).json(&VerifyRequest {
            qr_data: payload.to_string(),
        });

        if let Some(ref token) = self.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }
        if let Some(cookie) = self.cookie_header() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn verify(&self, payload: &str) -> VerificationOutcome {
        match self.post(payload).await {
            Ok((status, body)) => {
                let outcome = classify_response(status, &body);
                tracing::info!(
                    http_status = status,
                    outcome = outcome.label(),
                    "Verification response received"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Verification request failed");
                VerificationOutcome::TransportFailure {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const PATH: &str = "/api/process-qr-scan/";

    #[tokio::test]
    async fn test_granted_request_carries_csrf_and_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-csrftoken", "tok123")
            .match_header("cookie", "csrftoken=tok123; sessionid=abc")
            .match_body(Matcher::Json(json!({"qr_data": "{'user_id': 3}"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "status": "allowed",
                    "user": {"name": "Ana", "rut": "1-9", "access_time": "08:00:00"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let verifier = HttpVerifier::new(format!("{}{}", server.url(), PATH))
            .unwrap()
            .with_csrf_token("tok123")
            .with_session_cookie("abc");

        let outcome = verifier.verify("{'user_id': 3}").await;
        assert_eq!(outcome.label(), "granted");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_403_already_accessed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(403)
            .with_body(
                json!({
                    "success": false,
                    "already_accessed_today": true,
                    "error": "Ya registraste entrada",
                    "user": {"name": "Ana", "rut": "1-9"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let verifier = HttpVerifier::new(format!("{}{}", server.url(), PATH)).unwrap();
        let outcome = verifier.verify("payload").await;
        assert_eq!(outcome.label(), "already_processed_today");
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(500)
            .with_body(json!({"success": false, "error": "boom"}).to_string())
            .create_async()
            .await;

        let verifier = HttpVerifier::new(format!("{}{}", server.url(), PATH)).unwrap();
        let outcome = verifier.verify("payload").await;
        assert_eq!(
            outcome,
            VerificationOutcome::TransportFailure {
                reason: "HTTP 500".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        let verifier = HttpVerifier::with_timeout(
            "http://127.0.0.1:1/api/process-qr-scan/",
            Duration::from_millis(500),
        )
        .unwrap();

        assert!(verifier.verify("payload").await.is_transport_failure());
        assert!(!verifier.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_gives_up_on_silent_endpoint() {
        // Accepts connections (kernel backlog) but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let verifier = HttpVerifier::with_timeout(
            format!("http://{}/api/process-qr-scan/", addr),
            Duration::from_secs(30),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let healthy = tokio::time::timeout(Duration::from_secs(5), verifier.health_check())
            .await
            .expect("health check outlived its own timeout");
        assert!(!healthy);
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[test]
    fn test_cookie_header_omitted_without_credentials() {
        let verifier = HttpVerifier::new("http://localhost/api/process-qr-scan/").unwrap();
        assert!(verifier.cookie_header().is_none());
    }
}
