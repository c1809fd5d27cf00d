// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Auth Server Client
//!
//! HTTP/JSON client for the six auth endpoints plus policy metadata.
//!
//! ## Authorization Headers
//!
//! - `Bearer <tempToken>`: registration-scoped credential
//! - `Session <sessionId>`: established session handle
//!
//! Non-2xx responses become [`ApiError::Status`] carrying the response
//! body so callers can surface server-provided detail when present.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::{AppConfig, HTTP_TIMEOUT};
use crate::models::{AcceptedPolicySet, PolicyMeta, PolicyName, UserRecord};
use crate::wallet::{SignInPayload, SignInResult};

// =============================================================================
// Wire Types
// =============================================================================

/// Body of `POST /api/auth/verify`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<'a> {
    pub sign_in_input: &'a SignInPayload,
    pub sign_in_output: &'a SignInResult,
    pub accepted_policies: &'a AcceptedPolicySet,
}

/// Response of `POST /api/auth/verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(default)]
    pub is_new_user: bool,
    pub temp_token: Option<String>,
    pub wallet_address: Option<String>,
    pub session_id: Option<String>,
    pub user: Option<UserRecord>,
    pub error: Option<String>,
}

/// Body of `POST /api/auth/register-username`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub accepted_policies: &'a AcceptedPolicySet,
}

/// Response of `POST /api/auth/register-username`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub session_id: Option<String>,
    pub user: Option<UserRecord>,
    pub error: Option<String>,
}

/// Response of `GET /api/auth/validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    #[serde(default)]
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct PoliciesResponse {
    success: bool,
    #[serde(default)]
    data: Vec<PolicyMeta>,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response. `body` is the raw response text, which may carry
    /// a server-provided error message.
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response whose body did not match the expected shape.
    #[error("server response was invalid: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// AuthApi
// =============================================================================

/// Client for the Auth Server. Cheap to clone; wraps one pooled
/// `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct AuthApi {
    base_url: Url,
    http: Client,
}

impl AuthApi {
    /// Build a client for the configured server.
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        Self::with_timeout(config, HTTP_TIMEOUT)
    }

    /// Build a client with a custom request timeout (tests use short ones).
    pub fn with_timeout(config: &AppConfig, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: config.server_url.clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidResponse(format!("bad endpoint {path}: {e}")))
    }

    /// `POST /api/auth/verify`: submit the signed sign-in result.
    pub async fn verify(&self, request: &VerifyRequest<'_>) -> Result<VerifyResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/auth/verify")?)
            .json(request)
            .send()
            .await?;
        Self::json_or_status(response).await
    }

    /// `POST /api/auth/register-username`: claim a username with the
    /// registration-scoped bearer token.
    pub async fn register_username(
        &self,
        temp_token: &str,
        request: &RegisterRequest<'_>,
    ) -> Result<RegisterResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/auth/register-username")?)
            .header("Authorization", format!("Bearer {temp_token}"))
            .json(request)
            .send()
            .await?;
        Self::json_or_status(response).await
    }

    /// `GET /api/auth/validate`: check a session server-side.
    pub async fn validate(&self, session_id: &str) -> Result<ValidateResponse, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/auth/validate")?)
            .header("Authorization", format!("Session {session_id}"))
            .send()
            .await?;
        Self::json_or_status(response).await
    }

    /// `POST /api/auth/extend-session`: push the server-side expiry
    /// forward. Returns whether the server reported success.
    pub async fn extend_session(&self, session_id: &str) -> Result<bool, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/auth/extend-session")?)
            .header("Authorization", format!("Session {session_id}"))
            .send()
            .await?;
        let body: SuccessResponse = Self::json_or_status(response).await?;
        Ok(body.success)
    }

    /// `POST /api/auth/logout`: invalidate the session server-side.
    /// Best-effort at call sites; the response body is ignored.
    pub async fn logout(&self, session_id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/auth/logout")?)
            .header("Authorization", format!("Session {session_id}"))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// `GET /api/policies`: current policy version metadata.
    pub async fn policy_versions(&self) -> Result<Vec<PolicyMeta>, ApiError> {
        let response = self.http.get(self.endpoint("/api/policies")?).send().await?;
        let body: PoliciesResponse = Self::json_or_status(response).await?;
        if !body.success {
            return Err(ApiError::InvalidResponse(
                "policies endpoint reported failure".to_string(),
            ));
        }
        Ok(body.data)
    }

    /// `GET /api/policies/:name`: full policy document, passed through
    /// uninterpreted for the policy-viewer collaborator.
    pub async fn policy_document(&self, name: PolicyName) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(self.endpoint(&format!("/api/policies/{}", name.as_str()))?)
            .send()
            .await?;
        Self::json_or_status(response).await
    }

    /// Decode a 2xx JSON body, or map a non-2xx response to
    /// [`ApiError::Status`] with its raw text preserved.
    async fn json_or_status<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::InvalidResponse(format!("malformed JSON body: {e}")))
    }
}
