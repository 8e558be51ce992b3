use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::errors::ApiError;
use crate::log_validation;

pub const SESSION_HEADER: &str = "x-session-token";

/// Checks a session token against the login portal. Abstracted behind a trait
/// so the API layer can be exercised without a running portal.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> bool;
}

/// Real verifier, delegates to the portal's `POST /api/verify-session`.
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifySessionResponse {
    valid: bool,
}

impl PortalClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionVerifier for PortalClient {
    /// An unreachable portal or a malformed reply denies access. Letting
    /// requests through while the portal is down would defeat the gate.
    async fn verify(&self, token: &str) -> bool {
        let url = format!("{}/api/verify-session", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<VerifySessionResponse>().await {
                    Ok(body) => body.valid,
                    Err(e) => {
                        log_validation!(failure, "session_gate", error = e);
                        false
                    }
                }
            }
            Ok(response) => {
                log_validation!(
                    failure,
                    "session_gate",
                    error = format!("portal returned {}", response.status())
                );
                false
            }
            Err(e) => {
                log_validation!(failure, "session_gate", error = e);
                false
            }
        }
    }
}

/// Middleware guarding the `/api` routes when the portal gate is enabled.
pub async fn require_session(
    State(verifier): State<Arc<dyn SessionVerifier>>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if token.is_empty() {
        return ApiError::Unauthorized("token de sessão ausente".to_string())
            .to_response()
            .into_response();
    }

    if verifier.verify(token).await {
        log_validation!(success, "session_gate", "session token accepted");
        next.run(request).await
    } else {
        ApiError::Unauthorized("sessão inválida ou expirada".to_string())
            .to_response()
            .into_response()
    }
}
