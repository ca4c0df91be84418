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

//! Test fixtures: provider properties and a test identity provider that signs
//! ID tokens with a throwaway RSA key.
//!
//! Compiled for unit tests and, with the `test-util` feature, for the
//! integration tests under `tests/`.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

use crate::config::{
    Properties, ProviderConfig, OAUTH_AUTHORIZATION_ENDPOINT, OAUTH_CLIENT_ID,
    OAUTH_CLIENT_SECRET, OAUTH_ISSUER, OAUTH_JWKS_ENDPOINT, OAUTH_REDIRECT_URI,
    OAUTH_TOKEN_ENDPOINT, OAUTH_USERNAME_CLAIM_TYPE,
};

pub const AUTHORIZE_URL: &str = "https://idp.example/authorize";
pub const ISSUER: &str = "https://idp.example/";
pub const CLIENT_ID: &str = "abc123";
pub const TOKEN_URL: &str = "https://idp.example/token";
pub const JWKS_URL: &str = "https://idp.example/jwks";

pub fn complete_properties() -> Properties {
    Properties::new()
        .with(OAUTH_AUTHORIZATION_ENDPOINT, AUTHORIZE_URL)
        .with(OAUTH_TOKEN_ENDPOINT, TOKEN_URL)
        .with(OAUTH_JWKS_ENDPOINT, JWKS_URL)
        .with(OAUTH_ISSUER, ISSUER)
        .with(OAUTH_CLIENT_ID, CLIENT_ID)
        .with(OAUTH_CLIENT_SECRET, "s3cret")
        .with(OAUTH_REDIRECT_URI, "https://app.example/login")
        .with(OAUTH_USERNAME_CLAIM_TYPE, "email")
}

pub fn provider_config() -> ProviderConfig {
    ProviderConfig::from_source(&complete_properties()).expect("complete test properties")
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Key generation is slow in debug builds, so one key serves every test.
fn test_rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
}

/// Signs ID tokens and publishes the matching JWKS document.
pub struct TestIdp {
    pub kid: String,
    encoding: EncodingKey,
    n: String,
    e: String,
}

impl TestIdp {
    pub fn new() -> Self {
        let private_key = test_rsa_key();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let encoding = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
        Self {
            kid: "test-kid-1".to_string(),
            encoding,
            n: URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        }
    }

    pub fn jwks(&self) -> Value {
        json!({
            "keys": [{
                "kty": "RSA",
                "use": "sig",
                "alg": "RS256",
                "kid": self.kid,
                "n": self.n,
                "e": self.e,
            }]
        })
    }

    /// Claims accepted by [`provider_config`] for `alice@example.com`.
    pub fn claims(&self) -> Value {
        self.claims_for("alice@example.com")
    }

    /// Claims accepted by [`provider_config`]: right issuer and audience,
    /// one hour of validity, `email` as the username.
    pub fn claims_for(&self, email: &str) -> Value {
        let now = now();
        json!({
            "iss": ISSUER,
            "aud": CLIENT_ID,
            "sub": format!("sub-{email}"),
            "email": email,
            "iat": now,
            "exp": now + 3600,
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        self.sign_with_header(header, claims)
    }

    pub fn sign_with_header(&self, header: Header, claims: &Value) -> String {
        encode(&header, claims, &self.encoding).unwrap()
    }
}
