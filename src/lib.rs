// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! Nok Auth Core - Wallet Authentication & Session Lifecycle
//!
//! This crate provides the wallet-based sign-in handshake, session
//! management, and policy consent gating for the Nok mobile learning
//! app. Screen rendering and navigation live in the app shell; this
//! crate owns the auth state machine and its persistence.
//!
//! ## Modules
//!
//! - `controller` - The connect/verify/register/disconnect state machine
//! - `session` - Session token lifecycle (load, validate, extend, clear)
//! - `policy` - Versioned legal-policy consent gating
//! - `api` - HTTP client for the Auth Server endpoints
//! - `wallet` - Transport contract to the external wallet application
//! - `storage` - Durable key/value store (redb)
//! - `error` - Failure taxonomy and user-facing classification

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod policy;
pub mod session;
pub mod storage;
pub mod wallet;

pub use config::AppConfig;
pub use controller::{AuthEvent, AuthState, ConnectOutcome, RegisterOutcome, WalletAuthController};
pub use error::{classify, AuthError, ErrorRecord, FlowStep, UserNotice};
