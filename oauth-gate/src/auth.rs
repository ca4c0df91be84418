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

//! Authentication decision core.
//!
//! [`Authenticator::authenticate`] looks at what the caller presented and does
//! exactly one of: validate an ID token, exchange a code and validate the
//! returned ID token, or answer with the login challenge for this deployment.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};

use crate::challenge::{
    build_challenge, AuthChallenge, FlowVariant, CODE_PARAMETER, PASSWORD_PARAMETER,
    TOKEN_PARAMETER, USERNAME_PARAMETER,
};
use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::http::HttpTransport;
use crate::oauth::{ClaimsValidator, TokenExchanger};

/// Identifier of this authentication provider as seen by the host.
pub const PROVIDER_IDENTIFIER: &str = "oauth";

/// What a caller presented with a single authentication attempt.
///
/// Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundCredentials {
    pub token: Option<String>,
    pub code: Option<String>,
    /// Accepted for compatibility with username/password forms; never used
    /// to authenticate.
    pub username: Option<String>,
    pub password: Option<String>,
    pub remote_addr: Option<SocketAddr>,
}

impl InboundCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = non_empty(token.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = non_empty(code.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = non_empty(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = non_empty(password.into());
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Read the well-known parameters from a URL query string. Unknown
    /// parameters are ignored; the first occurrence of a name wins.
    pub fn from_query(query: &str) -> Self {
        let mut creds = Self::new();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*name {
                TOKEN_PARAMETER => &mut creds.token,
                CODE_PARAMETER => &mut creds.code,
                USERNAME_PARAMETER => &mut creds.username,
                PASSWORD_PARAMETER => &mut creds.password,
                _ => continue,
            };
            if slot.is_none() {
                *slot = non_empty(value.into_owned());
            }
        }
        creds
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl<S: Send + Sync> FromRequestParts<S> for InboundCredentials {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut creds = Self::from_query(parts.uri.query().unwrap_or_default());
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            creds.remote_addr = Some(*addr);
        }
        Ok(creds)
    }
}

/// A user whose ID token passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub username: String,
    pub credentials: InboundCredentials,
}

/// Result of an authentication attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(VerifiedIdentity),
    /// Nothing usable was presented; this is what to ask for.
    Challenge(AuthChallenge),
}

/// Decides how to authenticate each request for one configured provider.
///
/// Holds no per-request state; a single instance serves all requests.
pub struct Authenticator {
    config: ProviderConfig,
    flow: FlowVariant,
    exchanger: TokenExchanger,
    validator: ClaimsValidator,
}

impl Authenticator {
    pub fn new(
        config: ProviderConfig,
        flow: FlowVariant,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let exchanger = TokenExchanger::new(&config, transport.clone());
        let validator = ClaimsValidator::new(&config, transport);
        Self {
            config,
            flow,
            exchanger,
            validator,
        }
    }

    /// Reuse fetched signing keys for up to `ttl` instead of fetching them for
    /// every validation.
    pub fn with_key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.validator = self.validator.with_key_cache_ttl(ttl);
        self
    }

    pub fn identifier(&self) -> &'static str {
        PROVIDER_IDENTIFIER
    }

    pub fn flow(&self) -> FlowVariant {
        self.flow
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The challenge returned to callers without credentials.
    pub fn challenge(&self) -> AuthChallenge {
        build_challenge(&self.config, self.flow)
    }

    /// Authenticate one request.
    ///
    /// A token takes precedence over a code. Failures are errors and never
    /// come with a challenge; only a request carrying neither gets one.
    pub async fn authenticate(
        &self,
        credentials: InboundCredentials,
    ) -> Result<AuthOutcome, AuthError> {
        let username = if let Some(token) = credentials.token.as_deref() {
            self.validator.validate(token).await?
        } else if let Some(code) = credentials.code.as_deref() {
            let tokens = self.exchanger.exchange(code).await?;
            let id_token = tokens.id_token.as_deref().ok_or_else(|| {
                tracing::warn!(
                    target: crate::oauth::AUDIT_TARGET,
                    "Token endpoint response did not include an ID token"
                );
                AuthError::InvalidToken("token response is missing id_token".to_string())
            })?;
            self.validator.validate(id_token).await?
        } else {
            tracing::debug!(
                flow = %self.flow,
                remote_addr = ?credentials.remote_addr,
                "No OAuth credentials presented, issuing challenge"
            );
            return Ok(AuthOutcome::Challenge(self.challenge()));
        };

        tracing::info!(
            username = %username,
            remote_addr = ?credentials.remote_addr,
            "OAuth authentication succeeded"
        );
        Ok(AuthOutcome::Authenticated(VerifiedIdentity {
            username,
            credentials,
        }))
    }

    /// Refresh hook for an already authenticated user. Nothing about the
    /// identity is stored or re-checked, so it is returned as is.
    pub fn update_identity(
        &self,
        identity: VerifiedIdentity,
        _credentials: &InboundCredentials,
    ) -> VerifiedIdentity {
        identity
    }
}
