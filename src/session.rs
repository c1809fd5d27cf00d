// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Session Manager
//!
//! Owns the session token lifecycle: load, validate, extend, expire,
//! clear. The session is persisted as three independent store entries
//! (`sessionId`, `userData`, `lastActivity`), never as one blob.
//!
//! ## Fail-closed validation
//!
//! A session that looks valid locally must still be confirmed against
//! the server. Any ambiguity (network failure, non-2xx, `valid:false`)
//! clears local state and reports invalid: a stale session that the
//! server would reject must never authorize further action.
//!
//! ## Clearing
//!
//! [`SessionManager::clear`] removes each auth key independently and
//! swallows per-key failures, so one failing key never blocks cleanup of
//! the rest.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::config::SESSION_TIMEOUT_MS;
use crate::models::{Session, UserRecord};
use crate::storage::{keys, KvStore, StoreResult};

/// Result of a session probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub is_valid: bool,
    pub session_id: Option<String>,
}

impl SessionStatus {
    fn invalid() -> Self {
        Self {
            is_valid: false,
            session_id: None,
        }
    }
}

/// Whether a session with the given activity stamp has lapsed at `now`.
///
/// The window is a strict bound: a delta of exactly the timeout is still
/// considered alive. Saturating arithmetic keeps extreme stored stamps
/// (a corrupted store can hold any `i64`) on the expired path instead of
/// overflowing.
pub(crate) fn is_stale(last_activity_ms: i64, now_ms: i64) -> bool {
    now_ms.saturating_sub(last_activity_ms) > SESSION_TIMEOUT_MS
}

/// Session lifecycle owner.
pub struct SessionManager<S: KvStore> {
    store: Arc<S>,
    api: AuthApi,
}

impl<S: KvStore> SessionManager<S> {
    pub fn new(store: Arc<S>, api: AuthApi) -> Self {
        Self { store, api }
    }

    /// Load the persisted session: local expiry check first, then server
    /// confirmation. Fails closed: any local inconsistency or server
    /// rejection wipes all auth keys and reports invalid.
    pub async fn load(&self) -> SessionStatus {
        if self.is_expired() {
            info!("session expired due to inactivity, clearing authentication");
            self.clear();
            return SessionStatus::invalid();
        }
        self.validate_and_extend().await
    }

    /// Client-side inactivity check against the 24-hour rolling window.
    ///
    /// A session with no recorded activity stamp is healed by stamping
    /// now; a stamp that is missing along with the session, or that does
    /// not parse, counts as expired.
    pub fn is_expired(&self) -> bool {
        let last_activity = self.store.get(keys::LAST_ACTIVITY).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read activity stamp");
            None
        });
        let session_id = self.store.get(keys::SESSION_ID).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read session id");
            None
        });

        match (session_id, last_activity) {
            (Some(_), None) => {
                // Session predates activity tracking; start the window now
                debug!("session has no activity stamp, initializing");
                if let Err(e) = self.touch() {
                    warn!(error = %e, "failed to initialize activity stamp");
                }
                false
            }
            (None, _) => true,
            (Some(_), Some(raw)) => match raw.parse::<i64>() {
                Ok(last_ms) => is_stale(last_ms, Utc::now().timestamp_millis()),
                Err(_) => true,
            },
        }
    }

    /// Confirm the stored session against the server and push its expiry
    /// forward. Clears local state on any non-success.
    pub async fn validate_and_extend(&self) -> SessionStatus {
        let session_id = match self.store.get(keys::SESSION_ID) {
            Ok(Some(id)) => id,
            Ok(None) => return SessionStatus::invalid(),
            Err(e) => {
                warn!(error = %e, "failed to read session id");
                return SessionStatus::invalid();
            }
        };

        match self.api.validate(&session_id).await {
            Ok(result) if result.success && result.valid => {
                if let Err(e) = self.api.extend_session(&session_id).await {
                    warn!(error = %e, "session extension failed");
                }
                if let Err(e) = self.touch() {
                    warn!(error = %e, "failed to stamp activity");
                }
                SessionStatus {
                    is_valid: true,
                    session_id: Some(session_id),
                }
            }
            Ok(_) => {
                info!("server rejected session, clearing local state");
                self.clear();
                SessionStatus::invalid()
            }
            Err(e) => {
                // Ambiguous network conditions fail closed
                warn!(error = %e, "session validation failed, clearing local state");
                self.clear();
                SessionStatus::invalid()
            }
        }
    }

    /// The persisted session, `None` if any entry is missing or
    /// malformed.
    pub fn current(&self) -> Option<Session> {
        let session_id = self.store.get(keys::SESSION_ID).ok()??;
        let user_json = self.store.get(keys::USER_DATA).ok()??;
        let user: UserRecord = match serde_json::from_str(&user_json) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "stored user data is malformed");
                return None;
            }
        };
        let last_activity_at = self
            .store
            .get(keys::LAST_ACTIVITY)
            .ok()
            .flatten()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        Some(Session {
            session_id,
            user,
            last_activity_at,
        })
    }

    /// Persist a freshly established session and stamp activity.
    pub fn save(&self, session_id: &str, user: &UserRecord) -> StoreResult<()> {
        let user_json = serde_json::to_string(user)
            .map_err(|e| crate::storage::StoreError::Backend(e.to_string()))?;
        self.store.put(keys::SESSION_ID, session_id)?;
        self.store.put(keys::USER_DATA, &user_json)?;
        self.touch()
    }

    /// Refresh the activity stamp, keeping the rolling window alive.
    pub fn touch(&self) -> StoreResult<()> {
        self.store.put(
            keys::LAST_ACTIVITY,
            &Utc::now().timestamp_millis().to_string(),
        )
    }

    /// Remove every session and wallet-credential key, best-effort per
    /// key. Safe to call when some keys are already absent.
    pub fn clear(&self) {
        for key in keys::ALL_AUTH_KEYS {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to remove key during cleanup");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::MemoryStore;

    fn manager() -> SessionManager<MemoryStore> {
        // Port 1 is never listening: validation calls fail fast
        let config = AppConfig::new("http://localhost:1").unwrap();
        let api = AuthApi::new(&config).unwrap();
        SessionManager::new(Arc::new(MemoryStore::new()), api)
    }

    fn user() -> UserRecord {
        UserRecord {
            id: "u1".into(),
            username: "nok".into(),
            wallet_address: "addr".into(),
        }
    }

    #[test]
    fn stale_is_strictly_beyond_window() {
        let now = 1_700_000_000_000;
        assert!(!is_stale(now - SESSION_TIMEOUT_MS, now));
        assert!(!is_stale(now, now));
        assert!(is_stale(now - SESSION_TIMEOUT_MS - 1, now));
        // Extreme stamps from a corrupted store expire instead of
        // overflowing
        assert!(is_stale(i64::MIN, now));
        assert!(!is_stale(i64::MAX, now));
    }

    #[test]
    fn save_then_current_roundtrips() {
        let sessions = manager();
        sessions.save("sess-1", &user()).unwrap();

        let session = sessions.current().expect("session present");
        assert_eq!(session.session_id, "sess-1");
        assert_eq!(session.user, user());
        assert!(session.last_activity_at > 0);
    }

    #[test]
    fn no_session_counts_as_expired() {
        let sessions = manager();
        assert!(sessions.is_expired());
    }

    #[test]
    fn missing_activity_stamp_is_healed() {
        let sessions = manager();
        sessions.store.put(keys::SESSION_ID, "sess-1").unwrap();
        assert!(!sessions.is_expired());
        // Stamp was initialized
        assert!(sessions.store.get(keys::LAST_ACTIVITY).unwrap().is_some());
    }

    #[test]
    fn unparseable_activity_stamp_is_expired() {
        let sessions = manager();
        sessions.store.put(keys::SESSION_ID, "sess-1").unwrap();
        sessions.store.put(keys::LAST_ACTIVITY, "yesterday").unwrap();
        assert!(sessions.is_expired());
    }

    #[test]
    fn stale_session_is_expired() {
        let sessions = manager();
        let stale = Utc::now().timestamp_millis() - SESSION_TIMEOUT_MS - 1000;
        sessions.store.put(keys::SESSION_ID, "sess-1").unwrap();
        sessions
            .store
            .put(keys::LAST_ACTIVITY, &stale.to_string())
            .unwrap();
        assert!(sessions.is_expired());
    }

    #[test]
    fn clear_removes_all_auth_keys() {
        let sessions = manager();
        sessions.save("sess-1", &user()).unwrap();
        sessions.store.put(keys::WALLET_AUTH_TOKEN, "tok").unwrap();
        sessions.store.put(keys::WALLET_ADDRESS, "addr").unwrap();

        sessions.clear();

        for key in keys::ALL_AUTH_KEYS {
            assert!(sessions.store.get(key).unwrap().is_none(), "{key} remains");
        }
    }

    #[test]
    fn clear_tolerates_absent_keys() {
        let sessions = manager();
        sessions.clear();
        sessions.clear();
    }

    #[tokio::test]
    async fn load_with_expired_session_clears_everything() {
        let sessions = manager();
        let stale = Utc::now().timestamp_millis() - SESSION_TIMEOUT_MS - 1000;
        sessions.save("sess-1", &user()).unwrap();
        sessions
            .store
            .put(keys::LAST_ACTIVITY, &stale.to_string())
            .unwrap();
        sessions.store.put(keys::WALLET_AUTH_TOKEN, "tok").unwrap();

        let status = sessions.load().await;
        assert!(!status.is_valid);
        assert!(sessions.store.get(keys::SESSION_ID).unwrap().is_none());
        assert!(sessions.store.get(keys::WALLET_AUTH_TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_server_fails_closed() {
        let sessions = manager();
        sessions.save("sess-1", &user()).unwrap();

        let status = sessions.load().await;
        assert!(!status.is_valid);
        assert!(status.session_id.is_none());
        assert!(sessions.store.get(keys::SESSION_ID).unwrap().is_none());
    }

    #[tokio::test]
    async fn validate_without_session_is_invalid_without_clearing() {
        let sessions = manager();
        sessions.store.put(keys::POLICY_ACCEPTED, "{}").unwrap();

        let status = sessions.validate_and_extend().await;
        assert!(!status.is_valid);
        // Consent record is not an auth key and must survive
        assert!(sessions.store.get(keys::POLICY_ACCEPTED).unwrap().is_some());
    }
}
