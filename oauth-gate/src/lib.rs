/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! OAuth authentication gateway library.
//!
//! This crate provides the authentication decision core (challenge, code
//! exchange, ID token validation), its configuration, and the Axum router of
//! the `oauth-gate` service. The binary entry point (`main.rs`) is a thin
//! wrapper that calls into this library.

pub mod auth;
pub mod challenge;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod response;
pub mod routes;
pub mod state;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
