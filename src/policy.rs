// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Policy Consent Gate
//!
//! Decides whether the user must (re-)accept the Terms, Privacy, and
//! Content policies before authentication may proceed.
//!
//! ## Fallback
//!
//! Version metadata comes from the server when reachable, otherwise from
//! versions bundled with the app build. [`PolicyGate::current_versions`]
//! therefore never fails its caller.
//!
//! ## Comparison
//!
//! Consent is keyed on exact version-string equality. There is no
//! semantic-version ordering: any difference, including a downgrade,
//! requires fresh consent.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiError, AuthApi};
use crate::models::{AcceptedPolicySet, PolicyMeta, PolicyName, PolicyVersionSet};
use crate::storage::{keys, KvStore, StoreResult};

/// Bundled fallback versions, kept in sync with the shipped documents.
const FALLBACK_TERMS_VERSION: &str = "1.0.0";
const FALLBACK_PRIVACY_VERSION: &str = "1.0.0";
const FALLBACK_CONTENT_VERSION: &str = "1.0.0";

/// Gate over policy versions and recorded consent.
pub struct PolicyGate<S: KvStore> {
    store: Arc<S>,
    api: AuthApi,
}

impl<S: KvStore> PolicyGate<S> {
    pub fn new(store: Arc<S>, api: AuthApi) -> Self {
        Self { store, api }
    }

    /// Fetch the freshest policy versions, falling back to the bundled
    /// set on any failure (timeout, bad shape, non-2xx, missing policy).
    pub async fn current_versions(&self) -> PolicyVersionSet {
        match self.fetch_server_versions().await {
            Some(versions) => versions,
            None => {
                debug!("using bundled fallback policy versions");
                Self::fallback_versions()
            }
        }
    }

    async fn fetch_server_versions(&self) -> Option<PolicyVersionSet> {
        let metas = match self.api.policy_versions().await {
            Ok(metas) => metas,
            Err(e) => {
                debug!(error = %e, "policy version fetch failed");
                return None;
            }
        };

        let find = |name: PolicyName| {
            metas
                .iter()
                .find(|meta| meta.name == name)
                .cloned()
        };
        Some(PolicyVersionSet {
            terms: find(PolicyName::Terms)?,
            privacy: find(PolicyName::Privacy)?,
            content: find(PolicyName::Content)?,
        })
    }

    /// The versions bundled with this build.
    pub fn fallback_versions() -> PolicyVersionSet {
        PolicyVersionSet {
            terms: PolicyMeta {
                name: PolicyName::Terms,
                version: FALLBACK_TERMS_VERSION.to_string(),
            },
            privacy: PolicyMeta {
                name: PolicyName::Privacy,
                version: FALLBACK_PRIVACY_VERSION.to_string(),
            },
            content: PolicyMeta {
                name: PolicyName::Content,
                version: FALLBACK_CONTENT_VERSION.to_string(),
            },
        }
    }

    /// The persisted consent record, `None` if absent or malformed.
    pub fn accepted(&self) -> Option<AcceptedPolicySet> {
        let raw = match self.store.get(keys::POLICY_ACCEPTED) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "failed to read accepted policies");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(error = %e, "stored accepted policies are malformed");
                None
            }
        }
    }

    /// Fetch the full text of one policy for display. No fallback here:
    /// the viewer shows its own offline notice on failure.
    pub async fn document(&self, name: PolicyName) -> Result<serde_json::Value, ApiError> {
        self.api.policy_document(name).await
    }

    /// Persist an explicit consent record verbatim.
    pub fn record_acceptance(&self, accepted: &AcceptedPolicySet) -> StoreResult<()> {
        let json = serde_json::to_string(accepted)
            .map_err(|e| crate::storage::StoreError::Backend(e.to_string()))?;
        self.store.put(keys::POLICY_ACCEPTED, &json)
    }
}

/// Whether consent must be (re-)collected for `current` given what was
/// previously `accepted`.
pub fn needs_acceptance(current: &PolicyVersionSet, accepted: Option<&AcceptedPolicySet>) -> bool {
    let Some(accepted) = accepted else {
        return true;
    };
    accepted.terms.version != current.terms.version
        || accepted.privacy.version != current.privacy.version
        || accepted.content.version != current.content.version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::PolicyAcceptance;
    use crate::storage::MemoryStore;
    use chrono::Utc;

    fn gate() -> PolicyGate<MemoryStore> {
        let config = AppConfig::new("http://localhost:1").unwrap();
        let api = AuthApi::new(&config).unwrap();
        PolicyGate::new(Arc::new(MemoryStore::new()), api)
    }

    fn accepted_matching(versions: &PolicyVersionSet) -> AcceptedPolicySet {
        AcceptedPolicySet::accept_now(versions)
    }

    #[test]
    fn needs_acceptance_when_nothing_recorded() {
        let versions = PolicyGate::<MemoryStore>::fallback_versions();
        assert!(needs_acceptance(&versions, None));
    }

    #[test]
    fn needs_acceptance_on_any_version_difference() {
        let versions = PolicyGate::<MemoryStore>::fallback_versions();
        let mut accepted = accepted_matching(&versions);
        assert!(!needs_acceptance(&versions, Some(&accepted)));

        accepted.privacy.version = "0.9.0".into();
        assert!(needs_acceptance(&versions, Some(&accepted)));
    }

    #[test]
    fn exact_string_comparison_no_semver() {
        let versions = PolicyGate::<MemoryStore>::fallback_versions();
        let mut accepted = accepted_matching(&versions);
        // "1.0" != "1.0.0" even though semantically equal
        accepted.terms.version = "1.0".into();
        assert!(needs_acceptance(&versions, Some(&accepted)));
    }

    #[test]
    fn record_acceptance_roundtrips_field_for_field() {
        let gate = gate();
        let versions = PolicyGate::<MemoryStore>::fallback_versions();
        let accepted = AcceptedPolicySet {
            terms: PolicyAcceptance {
                version: versions.terms.version.clone(),
                accepted_at: Utc::now(),
            },
            privacy: PolicyAcceptance {
                version: versions.privacy.version.clone(),
                accepted_at: Utc::now(),
            },
            content: PolicyAcceptance {
                version: versions.content.version.clone(),
                accepted_at: Utc::now(),
            },
        };

        gate.record_acceptance(&accepted).unwrap();
        let read = gate.accepted().expect("accepted set present");
        assert_eq!(read, accepted);
    }

    #[test]
    fn malformed_stored_consent_reads_as_none() {
        let gate = gate();
        gate.store.put(keys::POLICY_ACCEPTED, "not json").unwrap();
        assert!(gate.accepted().is_none());
    }

    #[tokio::test]
    async fn unreachable_server_falls_back() {
        let gate = gate();
        let versions = gate.current_versions().await;
        assert_eq!(versions.terms.version, FALLBACK_TERMS_VERSION);
    }
}
