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

//! JWKS (JSON Web Key Set) resolution with an optional time-bounded cache.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, Header};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::http::{HttpTransport, TransportError};

/// Reasons a signing key could not be resolved for a token.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    #[error("failed to parse JWKS: {0}")]
    Malformed(String),

    #[error("JWKS contains no usable signing keys")]
    NoUsableKeys,

    /// The key set is fine but nothing in it matches the token header.
    #[error("no signing key matches kid {kid:?} and algorithm {alg:?}")]
    NoMatchingKey { kid: Option<String>, alg: Algorithm },
}

impl KeySetError {
    /// `true` when the key set itself could not be obtained, as opposed to the
    /// token naming a key the provider does not publish.
    pub fn is_key_set_failure(&self) -> bool {
        !matches!(self, KeySetError::NoMatchingKey { .. })
    }
}

/// A JWK entry from the JWKS endpoint.
#[derive(Debug, Deserialize)]
struct JwkEntry {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    #[serde(default, rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    // RSA fields
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    // EC fields
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkEntry>,
}

/// One verification key published by the provider.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: Option<String>,
    algorithms: Vec<Algorithm>,
    key: DecodingKey,
}

impl SigningKey {
    /// Whether tokens signed with `alg` may be verified with this key.
    pub fn supports(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }
}

/// Parsed key set. Entries that are not usable for signature verification
/// (encryption keys, unknown key types, incomplete parameters) are dropped.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    pub fn parse(body: &[u8]) -> Result<Self, KeySetError> {
        let doc: JwksDocument =
            serde_json::from_slice(body).map_err(|e| KeySetError::Malformed(e.to_string()))?;

        let keys: Vec<SigningKey> = doc.keys.iter().filter_map(signing_key).collect();
        if keys.is_empty() {
            return Err(KeySetError::NoUsableKeys);
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Pick the key for a token header: by `kid` when the header names one,
    /// falling back to keys published without a `kid`; otherwise the first
    /// key supporting the header algorithm. The header algorithm must be one
    /// the chosen key supports.
    pub fn select(&self, header: &Header) -> Option<&SigningKey> {
        let usable = self.keys.iter().filter(|k| k.supports(header.alg));
        match header.kid.as_deref() {
            Some(kid) => usable
                .clone()
                .find(|k| k.kid.as_deref() == Some(kid))
                .or_else(|| usable.clone().find(|k| k.kid.is_none())),
            None => usable.clone().next(),
        }
    }
}

fn signing_key(jwk: &JwkEntry) -> Option<SigningKey> {
    if jwk.key_use.as_deref() == Some("enc") {
        return None;
    }

    let algorithms = jwk_algorithms(jwk)?;

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().unwrap_or_default();
            let e = jwk.e.as_deref().unwrap_or_default();
            if n.is_empty() || e.is_empty() {
                return None;
            }
            DecodingKey::from_rsa_components(n, e).ok()?
        }
        "EC" => {
            let x = jwk.x.as_deref().unwrap_or_default();
            let y = jwk.y.as_deref().unwrap_or_default();
            if x.is_empty() || y.is_empty() {
                return None;
            }
            DecodingKey::from_ec_components(x, y).ok()?
        }
        _ => return None,
    };

    Some(SigningKey {
        kid: jwk.kid.clone(),
        algorithms,
        key,
    })
}

/// Algorithms a JWK may verify. An explicit `alg` pins a single algorithm;
/// otherwise the key type (and curve for EC keys) decides.
fn jwk_algorithms(jwk: &JwkEntry) -> Option<Vec<Algorithm>> {
    if let Some(alg) = &jwk.alg {
        let alg = Algorithm::from_str(alg).ok()?;
        let family_ok = match jwk.kty.as_str() {
            "RSA" => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            "EC" => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
            _ => false,
        };
        return family_ok.then(|| vec![alg]);
    }

    match jwk.kty.as_str() {
        "RSA" => Some(vec![
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ]),
        "EC" => match jwk.crv.as_deref() {
            Some("P-384") => Some(vec![Algorithm::ES384]),
            Some("P-256") | None => Some(vec![Algorithm::ES256]),
            Some(_) => None,
        },
        _ => None,
    }
}

/// Resolves the verification key for an ID token from the provider's JWKS
/// endpoint.
///
/// Without a TTL every call fetches the key set. With a TTL the last fetched
/// set is reused until it expires, and a header naming an unknown `kid`
/// forces a refetch so rotated keys are picked up immediately.
pub struct KeySetResolver {
    transport: Arc<dyn HttpTransport>,
    jwks_url: String,
    cache_ttl: Option<Duration>,
    cached: RwLock<Option<(Instant, Arc<KeySet>)>>,
}

impl KeySetResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, jwks_url: impl Into<String>) -> Self {
        Self {
            transport,
            jwks_url: jwks_url.into(),
            cache_ttl: None,
            cached: RwLock::new(None),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Return the algorithm and key to verify a token with `header`.
    pub async fn resolve(&self, header: &Header) -> Result<(Algorithm, DecodingKey), KeySetError> {
        if let Some(keys) = self.fresh_cached().await {
            if let Some(found) = keys.select(header) {
                return Ok((header.alg, found.key.clone()));
            }
            tracing::debug!(
                "No cached signing key for kid {:?}, refetching JWKS",
                header.kid
            );
        }

        let keys = self.fetch().await?;
        let selected = keys.select(header).map(|k| k.key.clone());
        if let Some(ttl) = self.cache_ttl {
            match Instant::now().checked_add(ttl) {
                Some(expires) => *self.cached.write().await = Some((expires, keys)),
                None => tracing::warn!("JWKS cache TTL {ttl:?} is out of range, not caching"),
            }
        }

        selected
            .map(|key| (header.alg, key))
            .ok_or_else(|| KeySetError::NoMatchingKey {
                kid: header.kid.clone(),
                alg: header.alg,
            })
    }

    async fn fresh_cached(&self) -> Option<Arc<KeySet>> {
        self.cache_ttl?;
        let cached = self.cached.read().await;
        match cached.as_ref() {
            Some((expires, keys)) if Instant::now() < *expires => Some(keys.clone()),
            _ => None,
        }
    }

    async fn fetch(&self) -> Result<Arc<KeySet>, KeySetError> {
        let resp = self.transport.get(&self.jwks_url).await?;
        if !resp.is_success() {
            tracing::debug!("JWKS error body: {}", resp.body_text());
            return Err(KeySetError::Status(resp.status));
        }
        let keys = KeySet::parse(&resp.body)?;
        tracing::debug!("Fetched {} signing keys from {}", keys.len(), self.jwks_url);
        Ok(Arc::new(keys))
    }
}
