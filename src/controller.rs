// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Wallet Auth Controller
//!
//! Orchestrates the end-to-end connect → sign-in → verify →
//! (register | login) → session-establish flow as an explicit state
//! machine.
//!
//! ## States
//!
//! ```text
//! Idle → Connecting → AwaitingPolicyConsent (→ Idle, consent prompt)
//!                   → AwaitingWalletApproval → VerifyingWithServer
//!                        → Authenticated
//!                        → AwaitingUsername → Authenticated
//!                                           → Idle (cancel)
//! Authenticated → Idle (disconnect)
//! ```
//!
//! Steps within one connect attempt are strictly sequential; a second
//! `connect()` observed while not `Idle` is a no-op. Every failure is
//! classified at the step that produced it and resolves to a stable
//! state before control returns; the controller is never left
//! mid-flight.
//!
//! Collaborators observe the flow through registered callbacks
//! ([`WalletAuthController::on_event`]); there is no process-global
//! state.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthApi, RegisterRequest, RegisterResponse, VerifyRequest};
use crate::config::{AppConfig, WALLET_TIMEOUT};
use crate::error::{AuthError, FlowStep, UserNotice};
use crate::models::{
    AcceptedPolicySet, CachedWalletCredential, PendingRegistration, PolicyVersionSet, UserRecord,
};
use crate::policy::{needs_acceptance, PolicyGate};
use crate::session::SessionManager;
use crate::storage::{keys, KvStore, StoreResult};
use crate::wallet::{AuthorizeRequest, DeauthorizeRequest, SignInPayload, WalletTransport};

/// Statement shown in the wallet's sign-in dialog.
const SIGN_IN_STATEMENT: &str = "Sign in to Nok";

/// Controller state. A session ([`Authenticated`](AuthState::Authenticated))
/// and a pending registration are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    Connecting,
    AwaitingPolicyConsent,
    AwaitingWalletApproval,
    VerifyingWithServer,
    AwaitingUsername(PendingRegistration),
    Authenticated(UserRecord),
}

impl AuthState {
    pub fn is_idle(&self) -> bool {
        matches!(self, AuthState::Idle)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Notifications delivered to registered collaborators.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// Authentication was established or torn down.
    AuthChanged {
        authenticated: bool,
        user: Option<UserRecord>,
    },
    /// Policy consent must be collected before connecting can proceed.
    ConsentRequired { versions: PolicyVersionSet },
    /// A classified, dismissable error notice.
    Notice(UserNotice),
}

/// Result of one [`WalletAuthController::connect`] attempt.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// A prior attempt is still in flight; this call was a no-op.
    AlreadyInProgress,
    /// Consent is required first; re-invoke connect after acceptance.
    ConsentRequired(PolicyVersionSet),
    /// Existing user, session established.
    Authenticated(UserRecord),
    /// New user: wallet verified, username must be chosen.
    UsernameRequired { wallet_address: String },
    /// The attempt failed; the flow is back at `Idle`.
    Failed(UserNotice),
}

/// Result of one [`WalletAuthController::submit_username`] attempt.
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    /// Account created, session established.
    Registered(UserRecord),
    /// Rejected; the flow remains at `AwaitingUsername` for retry.
    Rejected(UserNotice),
    /// No registration is pending; this call was a no-op.
    NotRegistering,
}

type EventSink = Box<dyn Fn(&AuthEvent) + Send + Sync>;

/// The auth flow state machine.
pub struct WalletAuthController<S: KvStore, W: WalletTransport> {
    config: AppConfig,
    api: AuthApi,
    wallet: W,
    store: Arc<S>,
    sessions: SessionManager<S>,
    policies: PolicyGate<S>,
    state: AuthState,
    wallet_timeout: Duration,
    sinks: Vec<EventSink>,
}

impl<S: KvStore, W: WalletTransport> WalletAuthController<S, W> {
    pub fn new(config: AppConfig, api: AuthApi, wallet: W, store: Arc<S>) -> Self {
        let sessions = SessionManager::new(Arc::clone(&store), api.clone());
        let policies = PolicyGate::new(Arc::clone(&store), api.clone());
        Self {
            config,
            api,
            wallet,
            store,
            sessions,
            policies,
            state: AuthState::Idle,
            wallet_timeout: WALLET_TIMEOUT,
            sinks: Vec::new(),
        }
    }

    /// Override the wallet round-trip bound (tests use short ones).
    pub fn with_wallet_timeout(mut self, timeout: Duration) -> Self {
        self.wallet_timeout = timeout;
        self
    }

    /// Register a collaborator callback for [`AuthEvent`]s.
    pub fn on_event(&mut self, sink: impl Fn(&AuthEvent) + Send + Sync + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Session manager, for collaborators that track activity.
    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    /// Policy gate, for the consent and policy-viewer collaborators.
    pub fn policies(&self) -> &PolicyGate<S> {
        &self.policies
    }

    /// Record consent for the given versions as of now. The caller
    /// re-invokes [`connect`](Self::connect) afterwards.
    pub fn accept_policies(&self, versions: &PolicyVersionSet) -> StoreResult<AcceptedPolicySet> {
        let accepted = AcceptedPolicySet::accept_now(versions);
        self.policies.record_acceptance(&accepted)?;
        Ok(accepted)
    }

    /// Restore authentication from the persistent store on app start.
    ///
    /// Runs the fail-closed session probe; on success the controller
    /// moves straight to `Authenticated` without a wallet round trip.
    pub async fn resume(&mut self) -> bool {
        if !self.state.is_idle() {
            return self.state.is_authenticated();
        }

        let had_session = matches!(self.store.get(keys::SESSION_ID), Ok(Some(_)));
        let expired_locally = had_session && self.sessions.is_expired();
        let status = self.sessions.load().await;
        if !status.is_valid {
            if expired_locally {
                // Inactivity lapse gets an explanation; a server-side
                // rejection at startup clears silently
                self.emit(AuthEvent::Notice(
                    AuthError::SessionExpired.notice(FlowStep::Session),
                ));
            }
            self.emit(AuthEvent::AuthChanged {
                authenticated: false,
                user: None,
            });
            return false;
        }

        match self.sessions.current() {
            Some(session) => {
                info!(username = %session.user.username, "restored session from storage");
                self.state = AuthState::Authenticated(session.user.clone());
                self.emit(AuthEvent::AuthChanged {
                    authenticated: true,
                    user: Some(session.user),
                });
                true
            }
            None => {
                // Valid probe but unreadable user data: fail closed
                warn!("session validated but user data unreadable, clearing");
                self.sessions.clear();
                self.emit(AuthEvent::AuthChanged {
                    authenticated: false,
                    user: None,
                });
                false
            }
        }
    }

    /// Run one connect attempt end to end.
    pub async fn connect(&mut self) -> ConnectOutcome {
        // At most one attempt in flight
        if !self.state.is_idle() {
            debug!(state = ?self.state, "connect ignored, attempt already in flight");
            return ConnectOutcome::AlreadyInProgress;
        }
        self.state = AuthState::Connecting;
        info!("starting wallet connection");

        // Consent gate runs against the freshest versions
        let versions = self.policies.current_versions().await;
        let accepted = self.policies.accepted();
        if needs_acceptance(&versions, accepted.as_ref()) {
            self.state = AuthState::AwaitingPolicyConsent;
            info!("policy consent required before connecting");
            self.emit(AuthEvent::ConsentRequired {
                versions: versions.clone(),
            });
            // The user must re-invoke connect after accepting
            self.state = AuthState::Idle;
            return ConnectOutcome::ConsentRequired(versions);
        }

        let sign_in_payload = SignInPayload {
            domain: self.config.sign_in_domain(),
            statement: SIGN_IN_STATEMENT.to_string(),
            uri: self.config.server_url.origin().ascii_serialization(),
        };

        // Cached token lets the wallet skip its approval dialog
        let cached = self.cached_wallet_credential();

        self.state = AuthState::AwaitingWalletApproval;
        let request = AuthorizeRequest {
            cluster: self.config.cluster.clone(),
            identity: self.config.identity.clone(),
            sign_in_payload: sign_in_payload.clone(),
            auth_token: cached.map(|credential| credential.auth_token),
        };

        let authorized = match tokio::time::timeout(self.wallet_timeout, self.wallet.authorize(request)).await
        {
            // Timeout leaves no side effects behind
            Err(_) => return self.fail_to_idle(AuthError::Timeout(self.wallet_timeout.as_secs())),
            Ok(Err(e)) => {
                self.clear_wallet_credential();
                return self.fail_to_idle(AuthError::WalletRejection(e.to_string()));
            }
            Ok(Ok(result)) => result,
        };

        let Some(account) = authorized.accounts.first().cloned() else {
            self.clear_wallet_credential();
            return self.fail_to_idle(AuthError::WalletRejection(
                "No wallet accounts found or authorization failed".to_string(),
            ));
        };
        let Some(sign_in_result) = authorized.sign_in_result.clone() else {
            self.clear_wallet_credential();
            return self.fail_to_idle(AuthError::WalletRejection(
                "No sign-in result from wallet".to_string(),
            ));
        };

        self.state = AuthState::VerifyingWithServer;
        let accepted = accepted.unwrap_or_else(|| AcceptedPolicySet::accept_now(&versions));
        let verify = VerifyRequest {
            sign_in_input: &sign_in_payload,
            sign_in_output: &sign_in_result,
            accepted_policies: &accepted,
        };

        let response = match self.api.verify(&verify).await {
            Ok(response) => response,
            Err(ApiError::Status { status, body }) => {
                // The server rejected verification outright
                self.clear_wallet_credential();
                let detail = if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                };
                return self.fail_to_idle(AuthError::Verification(format!(
                    "Authentication verification failed: {detail}"
                )));
            }
            Err(e) => return self.fail_to_idle(AuthError::Connectivity(e.to_string())),
        };

        if !response.success {
            self.clear_wallet_credential();
            let message = response
                .error
                .unwrap_or_else(|| "Authentication failed".to_string());
            return self.fail_to_idle(AuthError::Verification(message));
        }

        // Cache the wallet credential for silent reconnects. Session
        // establishment does not depend on this write succeeding.
        if let Some(auth_token) = &authorized.auth_token {
            self.save_wallet_credential(&CachedWalletCredential {
                auth_token: auth_token.clone(),
                wallet_address: account.address.clone(),
            });
        }

        if response.is_new_user {
            let Some(temp_token) = response.temp_token else {
                return self.fail_to_idle(AuthError::Verification(
                    "Registration token missing from server response".to_string(),
                ));
            };
            let wallet_address = response.wallet_address.unwrap_or(account.address);
            info!("wallet verified for new user, awaiting username");
            self.state = AuthState::AwaitingUsername(PendingRegistration {
                temp_token,
                wallet_address: wallet_address.clone(),
            });
            return ConnectOutcome::UsernameRequired { wallet_address };
        }

        let (Some(session_id), Some(user)) = (response.session_id, response.user) else {
            return self.fail_to_idle(AuthError::Verification(
                "Session missing from server response".to_string(),
            ));
        };
        if let Err(e) = self.sessions.save(&session_id, &user) {
            return self.fail_to_idle(AuthError::Storage(e));
        }

        info!(username = %user.username, "wallet connected");
        self.state = AuthState::Authenticated(user.clone());
        self.emit(AuthEvent::AuthChanged {
            authenticated: true,
            user: Some(user.clone()),
        });
        ConnectOutcome::Authenticated(user)
    }

    /// Submit the chosen username for a pending registration.
    pub async fn submit_username(&mut self, username: &str) -> RegisterOutcome {
        let AuthState::AwaitingUsername(pending) = self.state.clone() else {
            debug!(state = ?self.state, "submit_username ignored, no registration pending");
            return RegisterOutcome::NotRegistering;
        };

        let username = username.trim();
        if username.is_empty() {
            return RegisterOutcome::Rejected(UserNotice {
                title: "Registration Failed".to_string(),
                message: "Username is required.".to_string(),
            });
        }

        self.state = AuthState::VerifyingWithServer;
        let versions = self.policies.current_versions().await;
        let accepted = self
            .policies
            .accepted()
            .unwrap_or_else(|| AcceptedPolicySet::accept_now(&versions));
        let request = RegisterRequest {
            username,
            accepted_policies: &accepted,
        };

        let response = match self.api.register_username(&pending.temp_token, &request).await {
            Ok(response) => response,
            // Non-2xx rejections still carry the server's own error text
            // in the body; decode it so "Username already taken" and
            // friends reach the user verbatim
            Err(ApiError::Status { status, body }) => {
                match serde_json::from_str::<RegisterResponse>(&body) {
                    Ok(response) => response,
                    Err(_) => {
                        warn!(status, "registration rejected without a readable body");
                        self.state = AuthState::AwaitingUsername(pending);
                        let notice = UserNotice {
                            title: "Registration Failed".to_string(),
                            message: "Username registration failed. Please try again.".to_string(),
                        };
                        self.emit(AuthEvent::Notice(notice.clone()));
                        return RegisterOutcome::Rejected(notice);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "username registration request failed");
                self.state = AuthState::AwaitingUsername(pending);
                let notice = UserNotice {
                    title: "Registration Failed".to_string(),
                    message: "Failed to register username. Please check your connection and try again."
                        .to_string(),
                };
                self.emit(AuthEvent::Notice(notice.clone()));
                return RegisterOutcome::Rejected(notice);
            }
        };

        if !response.success {
            self.state = AuthState::AwaitingUsername(pending);
            // Server-provided text is surfaced verbatim when present
            let notice = UserNotice {
                title: "Registration Failed".to_string(),
                message: response
                    .error
                    .unwrap_or_else(|| "Username registration failed. Please try again.".to_string()),
            };
            self.emit(AuthEvent::Notice(notice.clone()));
            return RegisterOutcome::Rejected(notice);
        }

        let (Some(session_id), Some(user)) = (response.session_id, response.user) else {
            self.state = AuthState::AwaitingUsername(pending);
            let notice = UserNotice {
                title: "Registration Failed".to_string(),
                message: "Username registration failed. Please try again.".to_string(),
            };
            self.emit(AuthEvent::Notice(notice.clone()));
            return RegisterOutcome::Rejected(notice);
        };

        if let Err(e) = self.sessions.save(&session_id, &user) {
            self.state = AuthState::AwaitingUsername(pending);
            let notice = AuthError::Storage(e).notice(FlowStep::Registration);
            self.emit(AuthEvent::Notice(notice.clone()));
            return RegisterOutcome::Rejected(notice);
        }

        // The wallet token was cached at verify time; keep at least the
        // address around if that write never happened.
        match self.store.get(keys::WALLET_AUTH_TOKEN) {
            Ok(None) => {
                if let Err(e) = self.store.put(keys::WALLET_ADDRESS, &pending.wallet_address) {
                    warn!(error = %e, "failed to store wallet address after registration");
                }
            }
            Ok(Some(_)) => {}
            Err(e) => warn!(error = %e, "failed to read cached wallet token"),
        }

        info!(username = %user.username, "registration complete");
        self.state = AuthState::Authenticated(user.clone());
        self.emit(AuthEvent::AuthChanged {
            authenticated: true,
            user: Some(user.clone()),
        });
        RegisterOutcome::Registered(user)
    }

    /// Abandon a pending registration.
    ///
    /// The wallet was authorized but no session was ever established, so
    /// the cached credential is dropped too: a silent reconnect into a
    /// half-finished registration must not be possible.
    pub fn cancel_registration(&mut self) {
        if !matches!(self.state, AuthState::AwaitingUsername(_)) {
            return;
        }
        info!("registration cancelled");
        self.clear_wallet_credential();
        self.state = AuthState::Idle;
        self.emit(AuthEvent::AuthChanged {
            authenticated: false,
            user: None,
        });
    }

    /// Disconnect: best-effort wallet deauthorization and server logout,
    /// then an unconditional local wipe. Local state ends up clean even
    /// when the network is unreachable.
    pub async fn disconnect(&mut self) {
        if let Some(credential) = self.cached_wallet_credential() {
            let request = DeauthorizeRequest {
                auth_token: credential.auth_token,
            };
            if let Err(e) = self.wallet.deauthorize(request).await {
                debug!(error = %e, "wallet deauthorization failed (non-critical)");
            }
        }

        if let Some(session) = self.sessions.current() {
            match self.api.logout(&session.session_id).await {
                Ok(()) => info!("server logout successful"),
                Err(e) => debug!(error = %e, "server logout failed (non-critical)"),
            }
        }

        self.sessions.clear();
        self.state = AuthState::Idle;
        self.emit(AuthEvent::AuthChanged {
            authenticated: false,
            user: None,
        });
        info!("wallet disconnected");
    }

    fn emit(&self, event: AuthEvent) {
        for sink in &self.sinks {
            sink(&event);
        }
    }

    /// Resolve a failed connect attempt: classify, notify, reset.
    fn fail_to_idle(&mut self, error: AuthError) -> ConnectOutcome {
        warn!(error = %error, "connect attempt failed");
        self.state = AuthState::Idle;
        let notice = error.notice(FlowStep::Connect);
        self.emit(AuthEvent::Notice(notice.clone()));
        ConnectOutcome::Failed(notice)
    }

    /// The cached wallet credential, complete pairs only. Read failures
    /// degrade to "no credential".
    fn cached_wallet_credential(&self) -> Option<CachedWalletCredential> {
        let read = |key| {
            self.store.get(key).unwrap_or_else(|e| {
                warn!(key, error = %e, "failed to read cached wallet credential");
                None
            })
        };
        Some(CachedWalletCredential {
            auth_token: read(keys::WALLET_AUTH_TOKEN)?,
            wallet_address: read(keys::WALLET_ADDRESS)?,
        })
    }

    /// Drop the cached wallet credential so a rejected token cannot wedge
    /// future connects.
    fn clear_wallet_credential(&self) {
        for key in [keys::WALLET_AUTH_TOKEN, keys::WALLET_ADDRESS] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear wallet credential");
            }
        }
    }

    fn save_wallet_credential(&self, credential: &CachedWalletCredential) {
        if let Err(e) = self.store.put(keys::WALLET_AUTH_TOKEN, &credential.auth_token) {
            warn!(error = %e, "failed to cache wallet token");
            return;
        }
        if let Err(e) = self.store.put(keys::WALLET_ADDRESS, &credential.wallet_address) {
            warn!(error = %e, "failed to cache wallet address");
        }
    }
}
