// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Core Data Models
//!
//! Data structures shared across the auth subsystem. Wire types serialize
//! with camelCase field names to match the Auth Server's JSON contract.
//!
//! ## Ownership
//!
//! - [`Session`] is owned exclusively by the session manager and persisted
//!   as individual store entries, never as one blob.
//! - [`PendingRegistration`] is transient and held only in controller
//!   memory between a "new user" verify response and username submission.
//! - [`CachedWalletCredential`] is persisted beside the session and
//!   cleared on disconnect, session expiry, wallet decline, and server
//!   verification failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Users & Sessions
// =============================================================================

/// A registered user as issued by the Auth Server.
///
/// Immutable on the client except by server-issued updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Server-assigned user identifier.
    pub id: String,
    /// Chosen display name (3-20 characters, validated server-side).
    pub username: String,
    /// Wallet address this account is bound to.
    pub wallet_address: String,
}

/// The server-recognized, renewable authentication handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque session token presented on each request.
    pub session_id: String,
    /// The authenticated user.
    pub user: UserRecord,
    /// Last user-initiated activity, epoch milliseconds.
    pub last_activity_at: i64,
}

/// Short-lived registration state for a wallet the server has verified
/// but which has no account yet. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    /// Bearer credential scoped to completing registration.
    pub temp_token: String,
    /// Address proven by the sign-in signature.
    pub wallet_address: String,
}

/// Cached wallet authorization allowing silent reconnection without the
/// wallet's manual approval dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedWalletCredential {
    /// Wallet-issued reauthorization token.
    pub auth_token: String,
    /// Base64 address the token was issued for.
    pub wallet_address: String,
}

// =============================================================================
// Policy Consent
// =============================================================================

/// The three legal documents requiring versioned consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyName {
    Terms,
    Privacy,
    Content,
}

impl PolicyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::Terms => "terms",
            PolicyName::Privacy => "privacy",
            PolicyName::Content => "content",
        }
    }
}

/// Version metadata for one policy document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyMeta {
    pub name: PolicyName,
    pub version: String,
}

/// Current versions of all three policies, fetched from the server or
/// taken from the bundled fallback. Recomputed per connect attempt,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyVersionSet {
    pub terms: PolicyMeta,
    pub privacy: PolicyMeta,
    pub content: PolicyMeta,
}

/// One recorded consent: the version agreed to and when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAcceptance {
    pub version: String,
    pub accepted_at: DateTime<Utc>,
}

/// The user's persisted consent record, compared against
/// [`PolicyVersionSet`] to decide whether re-consent is required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptedPolicySet {
    pub terms: PolicyAcceptance,
    pub privacy: PolicyAcceptance,
    pub content: PolicyAcceptance,
}

impl AcceptedPolicySet {
    /// Accept every policy in `versions` as of now.
    pub fn accept_now(versions: &PolicyVersionSet) -> Self {
        let now = Utc::now();
        let accept = |meta: &PolicyMeta| PolicyAcceptance {
            version: meta.version.clone(),
            accepted_at: now,
        };
        Self {
            terms: accept(&versions.terms),
            privacy: accept(&versions.privacy),
            content: accept(&versions.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_record_uses_camel_case_wire_names() {
        let user = UserRecord {
            id: "u1".into(),
            username: "nok".into(),
            wallet_address: "addr".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["walletAddress"], "addr");
    }

    #[test]
    fn accept_now_copies_versions() {
        let versions = PolicyVersionSet {
            terms: PolicyMeta {
                name: PolicyName::Terms,
                version: "1.2".into(),
            },
            privacy: PolicyMeta {
                name: PolicyName::Privacy,
                version: "1.0".into(),
            },
            content: PolicyMeta {
                name: PolicyName::Content,
                version: "2.0".into(),
            },
        };
        let accepted = AcceptedPolicySet::accept_now(&versions);
        assert_eq!(accepted.terms.version, "1.2");
        assert_eq!(accepted.privacy.version, "1.0");
        assert_eq!(accepted.content.version, "2.0");
        assert_eq!(accepted.terms.accepted_at, accepted.content.accepted_at);
    }

    #[test]
    fn policy_name_serializes_lowercase() {
        let json = serde_json::to_string(&PolicyName::Privacy).unwrap();
        assert_eq!(json, r#""privacy""#);
    }
}
