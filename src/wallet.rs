// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Wallet Transport
//!
//! Contract for the out-of-process wallet application reachable through a
//! request/response "transact" channel. The wallet owns all cryptographic
//! internals (keys, signature algorithms); this crate only presents a
//! sign-in challenge and consumes the signed result.
//!
//! The trait is async and object-safe so the controller can be driven by
//! the platform transport in production and a mock in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppIdentity;

/// Structured challenge presented to the wallet for the user to sign,
/// proving control of an address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignInPayload {
    /// Host the signature is scoped to.
    pub domain: String,
    /// Human-readable intent, shown in the wallet's dialog.
    pub statement: String,
    /// Canonical app URI.
    pub uri: String,
}

/// The wallet's signed answer to a [`SignInPayload`].
///
/// Opaque to this crate beyond the address; forwarded verbatim to the
/// Auth Server for signature verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignInResult {
    /// Address that produced the signature.
    pub address: String,
    /// Base64 of the signed message bytes.
    pub signed_message: String,
    /// Base64 signature.
    pub signature: String,
}

/// One account the wallet authorized for this app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizedAccount {
    /// Base64 account address.
    pub address: String,
    /// Optional wallet-side label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Authorization request sent over the transact channel.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeRequest {
    /// Cluster the authorization is valid for.
    pub cluster: String,
    /// App identity shown in the approval dialog.
    pub identity: AppIdentity,
    /// Sign-in challenge to present.
    pub sign_in_payload: SignInPayload,
    /// Cached token requesting silent re-authorization, skipping the
    /// approval dialog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Authorization response from the wallet.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeResult {
    /// Accounts the user granted access to. May be empty on refusal.
    pub accounts: Vec<AuthorizedAccount>,
    /// Reauthorization token to cache for silent reconnects.
    pub auth_token: Option<String>,
    /// Signed sign-in result; absent if the wallet skipped the challenge.
    pub sign_in_result: Option<SignInResult>,
}

/// Request to revoke a previously issued authorization.
#[derive(Debug, Clone, Serialize)]
pub struct DeauthorizeRequest {
    pub auth_token: String,
}

/// Wallet transport failures.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("User declined authorization")]
    Declined,

    #[error("No wallet found on this device")]
    NoWalletFound,

    #[error("wallet transport failed: {0}")]
    Transport(String),
}

/// Request/response channel to the external wallet application.
#[async_trait]
pub trait WalletTransport: Send + Sync {
    /// Run one authorize round trip: present the sign-in challenge and
    /// wait for the user's (or cached-token) approval.
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResult, WalletError>;

    /// Revoke a cached authorization token.
    async fn deauthorize(&self, request: DeauthorizeRequest) -> Result<(), WalletError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn authorize_request_omits_absent_auth_token() {
        let config = AppConfig::new("https://nok.onrender.com").unwrap();
        let request = AuthorizeRequest {
            cluster: config.cluster.clone(),
            identity: config.identity.clone(),
            sign_in_payload: SignInPayload {
                domain: config.sign_in_domain(),
                statement: "Sign in to Nok".into(),
                uri: "https://nok.onrender.com".into(),
            },
            auth_token: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("auth_token").is_none());
        assert_eq!(json["sign_in_payload"]["domain"], "nok.onrender.com");
    }

    #[test]
    fn sign_in_result_uses_camel_case() {
        let result = SignInResult {
            address: "addr".into(),
            signed_message: "bXNn".into(),
            signature: "c2ln".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["signedMessage"], "bXNn");
    }
}
