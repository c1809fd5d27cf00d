// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Runtime Configuration
//!
//! Configuration for the auth core, loaded from the environment at
//! startup or constructed directly by the embedding app shell.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `NOK_SERVER_URL` | Auth Server base URL | `https://nok.onrender.com` |
//! | `NOK_CLUSTER` | Solana cluster for wallet authorization (`mainnet-beta` or `devnet`) | `mainnet-beta` |

use std::env;
use std::time::Duration;

use url::Url;

/// Default Auth Server base URL.
const DEFAULT_SERVER_URL: &str = "https://nok.onrender.com";

/// Default cluster requested from the wallet.
const DEFAULT_CLUSTER: &str = "mainnet-beta";

/// Bound on the whole wallet authorize round trip. Exceeding it surfaces
/// a timeout error and resets the flow with no side effects.
pub const WALLET_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-request timeout for Auth Server calls.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Rolling inactivity window after which a local session is considered
/// expired (matches the server-side session lifetime).
pub const SESSION_TIMEOUT_MS: i64 = 24 * 60 * 60 * 1000;

/// App identity presented to the wallet alongside the sign-in payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AppIdentity {
    pub name: String,
    pub uri: String,
    pub icon: String,
}

/// Auth core configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Auth Server base URL (scheme + host, no trailing path).
    pub server_url: Url,
    /// Cluster requested in wallet authorize calls.
    pub cluster: String,
    /// Identity shown in the wallet's approval dialog.
    pub identity: AppIdentity,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid server URL `{url}`: {source}")]
    InvalidServerUrl {
        url: String,
        source: url::ParseError,
    },
}

impl AppConfig {
    /// Build a configuration for the given server base URL.
    pub fn new(server_url: &str) -> Result<Self, ConfigError> {
        let server_url = Url::parse(server_url).map_err(|source| ConfigError::InvalidServerUrl {
            url: server_url.to_string(),
            source,
        })?;
        Ok(Self {
            server_url,
            cluster: DEFAULT_CLUSTER.to_string(),
            identity: AppIdentity {
                name: "Nok".to_string(),
                uri: "https://nok.onrender.com".to_string(),
                icon: "./assets/icon.png".to_string(),
            },
        })
    }

    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url =
            env::var("NOK_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let mut config = Self::new(&server_url)?;
        if let Ok(cluster) = env::var("NOK_CLUSTER") {
            config.cluster = cluster;
        }
        Ok(config)
    }

    /// Override the cluster (e.g. `devnet` for development builds).
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Domain presented in the sign-in challenge: the server host.
    pub fn sign_in_domain(&self) -> String {
        self.server_url
            .host_str()
            .unwrap_or("localhost")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_parses_server_url() {
        let config = AppConfig::new("https://nok.onrender.com").unwrap();
        assert_eq!(config.sign_in_domain(), "nok.onrender.com");
        assert_eq!(config.cluster, "mainnet-beta");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(AppConfig::new("not a url").is_err());
    }

    #[test]
    fn with_cluster_overrides() {
        let config = AppConfig::new("http://localhost:3000")
            .unwrap()
            .with_cluster("devnet");
        assert_eq!(config.cluster, "devnet");
    }
}
