// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Auth Error Taxonomy & Classifier
//!
//! Every externally-caused failure in the auth flow is mapped into
//! [`AuthError`] at the boundary of the step that produced it, then
//! classified into a short user-facing notice before reaching the UI.
//! Raw exception text never crosses the controller boundary unfiltered;
//! genuinely informative short messages are passed through verbatim.

use chrono::{DateTime, Utc};

use crate::storage::StoreError;

/// Failure categories observed by the auth flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Network unreachable, or a non-2xx response without a usable body.
    #[error("network error: {0}")]
    Connectivity(String),

    /// The wallet round trip exceeded its bound.
    #[error("wallet connection timed out after {0} seconds")]
    Timeout(u64),

    /// The user declined in the wallet, or no wallet app is available.
    #[error("wallet authorization failed: {0}")]
    WalletRejection(String),

    /// The server explicitly rejected verification or registration.
    #[error("{0}")]
    Verification(String),

    /// The session lapsed locally or was rejected server-side.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    /// The persistent store failed. Non-fatal: callers log and proceed
    /// with defaults where safe.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// A failure captured for the UI collaborator's diagnostics surface.
///
/// Transient: produced per failure, consumed and discarded.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// Raw message, before classification.
    pub message: String,
    /// Backtrace-ish detail, shown only behind a "technical details"
    /// expansion.
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// True when the failure was caught by the app shell's error
    /// boundary rather than a flow step.
    pub boundary_flag: bool,
    /// Which flow step produced the failure, e.g. "Authentication".
    pub context: Option<String>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>, context: Option<&str>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            timestamp: Utc::now(),
            boundary_flag: false,
            context: context.map(str::to_string),
        }
    }
}

/// A dismissable notice shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub title: String,
    pub message: String,
}

/// Which flow step a failure came from. Determines the notice title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Connect,
    Registration,
    Session,
}

impl FlowStep {
    fn title(&self) -> &'static str {
        match self {
            FlowStep::Connect => "Connection Failed",
            FlowStep::Registration => "Registration Failed",
            FlowStep::Session => "Session Ended",
        }
    }
}

/// Longest raw message passed through verbatim.
const VERBATIM_LIMIT: usize = 100;

/// Map a raw failure message to a user-appropriate notice.
///
/// Pure function: case-insensitive substring matching against known
/// categories, falling back to the raw message when it is short and does
/// not look like an internal token dump, else to a generic message.
pub fn classify(step: FlowStep, raw: &str) -> UserNotice {
    let lower = raw.to_lowercase();

    let message = if lower.contains("network") || lower.contains("fetch") {
        "Unable to connect to the server. Please check your internet connection and try again."
    } else if lower.contains("timeout") || lower.contains("timed out") {
        "The request took too long to complete. Please try again."
    } else if lower.contains("authentication") || lower.contains("unauthorized") {
        "Authentication failed. Please reconnect your wallet and try again."
    } else if lower.contains("no wallet found") {
        "No compatible wallet app found. Please install a Solana wallet app like Phantom Mobile."
    } else if lower.contains("user declined") {
        "Connection was cancelled by user."
    } else if lower.contains("wallet") {
        "There was an issue with your wallet connection. Please try reconnecting."
    } else if lower.contains("lesson") || lower.contains("progress") {
        "A lesson error occurred. Your progress has been saved. Please restart the lesson."
    } else if raw.len() < VERBATIM_LIMIT
        && !raw.contains("undefined")
        && !raw.contains("null")
        && !raw.is_empty()
    {
        return UserNotice {
            title: step.title().to_string(),
            message: raw.to_string(),
        };
    } else {
        "An unexpected error occurred. Please try again or restart the app if the problem persists."
    };

    UserNotice {
        title: step.title().to_string(),
        message: message.to_string(),
    }
}

impl AuthError {
    /// Classify this error for display.
    pub fn notice(&self, step: FlowStep) -> UserNotice {
        classify(step, &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_get_connectivity_message() {
        let notice = classify(FlowStep::Connect, "Network request failed");
        assert_eq!(notice.title, "Connection Failed");
        assert!(notice.message.contains("internet connection"));
    }

    #[test]
    fn timeout_classified_before_verbatim() {
        let notice = classify(
            FlowStep::Connect,
            "wallet connection timed out after 60 seconds",
        );
        assert_eq!(notice.message, "The request took too long to complete. Please try again.");
    }

    #[test]
    fn user_decline_is_cancellation() {
        let notice = classify(FlowStep::Connect, "User declined authorization");
        assert_eq!(notice.message, "Connection was cancelled by user.");
    }

    #[test]
    fn short_clean_message_passes_verbatim() {
        let notice = classify(FlowStep::Registration, "Username already taken");
        assert_eq!(notice.title, "Registration Failed");
        assert_eq!(notice.message, "Username already taken");
    }

    #[test]
    fn token_dump_falls_back_to_generic() {
        let notice = classify(FlowStep::Connect, "cannot read property of undefined");
        assert!(notice.message.starts_with("An unexpected error occurred"));
    }

    #[test]
    fn long_message_falls_back_to_generic() {
        let raw = "x".repeat(200);
        let notice = classify(FlowStep::Connect, &raw);
        assert!(notice.message.starts_with("An unexpected error occurred"));
    }

    #[test]
    fn auth_error_variants_classify() {
        let err = AuthError::Timeout(60);
        let notice = err.notice(FlowStep::Connect);
        assert_eq!(notice.message, "The request took too long to complete. Please try again.");

        let err = AuthError::WalletRejection("User declined authorization".into());
        let notice = err.notice(FlowStep::Connect);
        assert_eq!(notice.message, "Connection was cancelled by user.");
    }

    #[test]
    fn session_expiry_gets_session_title() {
        let notice = AuthError::SessionExpired.notice(FlowStep::Session);
        assert_eq!(notice.title, "Session Ended");
        assert_eq!(notice.message, "Your session has expired. Please sign in again.");
    }

    #[test]
    fn error_record_captures_context() {
        let record = ErrorRecord::new("boom", Some("Authentication"));
        assert_eq!(record.context.as_deref(), Some("Authentication"));
        assert!(!record.boundary_flag);
        assert!(record.stack.is_none());
    }
}
