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

//! Configuration: identity provider settings and the host server settings.
//!
//! Provider settings are read once at startup from a [`PropertySource`]. Every
//! provider property is required; a missing or blank value is reported as
//! [`AuthError::ConfigurationMissing`] and is never defaulted.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::challenge::FlowVariant;
use crate::error::AuthError;

pub const OAUTH_AUTHORIZATION_ENDPOINT: &str = "oauth-authorization-endpoint";
pub const OAUTH_TOKEN_ENDPOINT: &str = "oauth-token-endpoint";
pub const OAUTH_JWKS_ENDPOINT: &str = "oauth-jwks-endpoint";
pub const OAUTH_ISSUER: &str = "oauth-issuer";
pub const OAUTH_CLIENT_ID: &str = "oauth-client-id";
pub const OAUTH_CLIENT_SECRET: &str = "oauth-client-secret";
pub const OAUTH_REDIRECT_URI: &str = "oauth-redirect-uri";
pub const OAUTH_USERNAME_CLAIM_TYPE: &str = "oauth-username-claim-type";

/// Read-only key/value source of configuration properties.
pub trait PropertySource {
    fn property(&self, name: &str) -> Option<String>;
}

/// Reads properties from environment variables: `oauth-client-id` is looked
/// up as `OAUTH_CLIENT_ID`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl EnvSource {
    pub fn variable_name(property: &str) -> String {
        property
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl PropertySource for EnvSource {
    fn property(&self, name: &str) -> Option<String> {
        env::var(Self::variable_name(name)).ok()
    }
}

/// In-memory property map, optionally parsed from a properties file.
#[derive(Debug, Default, Clone)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Parse `name: value` or `name=value` lines. Blank lines and lines
    /// starting with `#` or `!` are skipped.
    pub fn parse(text: &str) -> Self {
        let values = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                let split = line.find(|c| c == ':' || c == '=')?;
                let (name, value) = line.split_at(split);
                Some((name.trim().to_string(), value[1..].trim().to_string()))
            })
            .collect();
        Self { values }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AuthError::ConfigurationInvalid {
            property: path.display().to_string(),
            detail: format!("unable to read properties file: {e}"),
        })?;
        Ok(Self::parse(&text))
    }
}

impl PropertySource for Properties {
    fn property(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Consults each source in order; the first one holding a value wins.
#[derive(Default)]
pub struct Layered {
    sources: Vec<Box<dyn PropertySource + Send + Sync>>,
}

impl Layered {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, source: impl PropertySource + Send + Sync + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl PropertySource for Layered {
    fn property(&self, name: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.property(name))
    }
}

/// Settings of the external identity provider. Immutable after startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_endpoint: String,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Name of the ID token claim holding the username (e.g. `email`).
    pub username_claim: String,
}

impl ProviderConfig {
    /// Load every provider property from `source`.
    pub fn from_source(source: &impl PropertySource) -> Result<Self, AuthError> {
        Ok(Self {
            authorization_endpoint: required(source, OAUTH_AUTHORIZATION_ENDPOINT)?,
            token_endpoint: required(source, OAUTH_TOKEN_ENDPOINT)?,
            jwks_endpoint: required(source, OAUTH_JWKS_ENDPOINT)?,
            issuer: required(source, OAUTH_ISSUER)?,
            client_id: required(source, OAUTH_CLIENT_ID)?,
            client_secret: required(source, OAUTH_CLIENT_SECRET)?,
            redirect_uri: required(source, OAUTH_REDIRECT_URI)?,
            username_claim: required(source, OAUTH_USERNAME_CLAIM_TYPE)?,
        })
    }

    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_source(&EnvSource)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("jwks_endpoint", &self.jwks_endpoint)
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("username_claim", &self.username_claim)
            .finish()
    }
}

fn required(source: &impl PropertySource, name: &str) -> Result<String, AuthError> {
    source
        .property(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::ConfigurationMissing(name.to_string()))
}

/// Configuration of the host binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server (e.g. "0.0.0.0:8080").
    pub listen_addr: String,
    /// Which login flow this deployment offers.
    pub flow: FlowVariant,
    /// Optional properties file consulted before the environment.
    pub properties_file: Option<String>,
    /// How long a fetched JWKS may be reused. `None` fetches on every validation.
    pub jwks_cache_ttl: Option<Duration>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Optional
    /// - `LISTEN_ADDR` (default: `"0.0.0.0:8080"`)
    /// - `OAUTH_FLOW` (`token` or `code`, default: `token`)
    /// - `OAUTH_PROPERTIES_FILE`
    /// - `OAUTH_JWKS_CACHE_SECS` (default: no caching)
    pub fn from_env() -> Result<Self, AuthError> {
        let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let flow = env::var("OAUTH_FLOW")
            .unwrap_or_else(|_| "token".to_string())
            .parse::<FlowVariant>()
            .map_err(|detail| AuthError::ConfigurationInvalid {
                property: "OAUTH_FLOW".to_string(),
                detail,
            })?;
        let properties_file = env::var("OAUTH_PROPERTIES_FILE")
            .ok()
            .filter(|s| !s.is_empty());
        let jwks_cache_ttl = env::var("OAUTH_JWKS_CACHE_SECS")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|secs| {
                secs.parse::<u64>()
                    .map_err(|_| AuthError::ConfigurationInvalid {
                        property: "OAUTH_JWKS_CACHE_SECS".to_string(),
                        detail: "must be a whole number of seconds".to_string(),
                    })
            })
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .map(|ttl| {
                Instant::now()
                    .checked_add(ttl)
                    .map(|_| ttl)
                    .ok_or_else(|| AuthError::ConfigurationInvalid {
                        property: "OAUTH_JWKS_CACHE_SECS".to_string(),
                        detail: "cache lifetime is out of range".to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            listen_addr,
            flow,
            properties_file,
            jwks_cache_ttl,
        })
    }

    /// Provider properties: the properties file if configured, then the environment.
    pub fn property_source(&self) -> Result<Layered, AuthError> {
        let mut layered = Layered::new();
        if let Some(path) = &self.properties_file {
            layered = layered.push(Properties::load(path)?);
        }
        Ok(layered.push(EnvSource))
    }
}
