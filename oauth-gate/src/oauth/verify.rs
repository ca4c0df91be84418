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

//! ID token signature and claims verification.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};

use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::http::HttpTransport;

use super::claims::IdTokenClaims;
use super::jwks::KeySetResolver;

/// Allowed clock skew, in seconds, when checking `exp` and `nbf`.
pub const CLOCK_SKEW_SECS: u64 = 30;

/// Tokens expiring further out than this are rejected.
pub const MAX_FUTURE_VALIDITY_SECS: u64 = 300 * 60;

/// Target for security-relevant rejections.
pub const AUDIT_TARGET: &str = "oauth_gate::audit";

/// Verifies ID tokens issued by the configured provider and extracts the
/// username claim.
pub struct ClaimsValidator {
    issuer: String,
    client_id: String,
    username_claim: String,
    keys: KeySetResolver,
}

impl ClaimsValidator {
    pub fn new(config: &ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            issuer: config.issuer.clone(),
            client_id: config.client_id.clone(),
            username_claim: config.username_claim.clone(),
            keys: KeySetResolver::new(transport, config.jwks_endpoint.clone()),
        }
    }

    /// Reuse fetched key sets for up to `ttl`.
    pub fn with_key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.keys = self.keys.with_cache_ttl(ttl);
        self
    }

    /// Verify `id_token` and return the username claim.
    ///
    /// Checks, in order: compact JWS structure, signing key resolution (by
    /// `kid`, else by algorithm), signature, `exp`/`sub` presence, `exp` and
    /// `nbf` with [`CLOCK_SKEW_SECS`] of skew, exact `iss`, `aud` containing the
    /// client ID, `exp` no more than [`MAX_FUTURE_VALIDITY_SECS`] ahead, and
    /// finally a non-empty string username claim.
    pub async fn validate(&self, id_token: &str) -> Result<String, AuthError> {
        let header = decode_header(id_token)
            .map_err(|e| rejected(format!("malformed token: {e}")))?;

        let (alg, key) = self.keys.resolve(&header).await.map_err(|e| {
            if e.is_key_set_failure() {
                tracing::error!(
                    "Unable to resolve signing keys from {}: {e}",
                    self.keys.jwks_url()
                );
                AuthError::InvalidToken(format!("signing key unavailable: {e}"))
            } else {
                rejected(e.to_string())
            }
        })?;

        let mut validation = Validation::new(alg);
        validation.leeway = CLOCK_SKEW_SECS;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| match e.kind() {
                // Only reachable once the signature has been verified.
                ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    tracing::error!("Verified ID token carries unreadable claims: {e}");
                    AuthError::ValidationInternal(e.to_string())
                }
                _ => rejected(e.to_string()),
            })?
            .claims;

        let latest = unix_now() + MAX_FUTURE_VALIDITY_SECS + CLOCK_SKEW_SECS;
        match claims.expires_at() {
            Some(exp) if exp <= latest => {}
            Some(exp) => {
                return Err(rejected(format!(
                    "expiry {exp} is more than {MAX_FUTURE_VALIDITY_SECS}s in the future"
                )))
            }
            None => return Err(rejected("expiry is not a number")),
        }

        claims.username(&self.username_claim).map_err(|e| match e {
            AuthError::InvalidToken(reason) => rejected(reason),
            other => {
                tracing::error!("{other}");
                other
            }
        })
    }
}

/// Record a token rejection on the audit target and build the error.
fn rejected(reason: impl Into<String>) -> AuthError {
    let reason = reason.into();
    tracing::warn!(target: AUDIT_TARGET, reason = %reason, "Rejected ID token");
    AuthError::InvalidToken(reason)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{Algorithm, Header};
    use serde_json::json;

    use super::*;
    use crate::http::{HttpResponse, StaticTransport};
    use crate::testing::{now, provider_config, TestIdp, JWKS_URL};

    fn validator(idp: &TestIdp) -> (ClaimsValidator, Arc<StaticTransport>) {
        let transport = Arc::new(StaticTransport::new());
        transport.respond(JWKS_URL, HttpResponse::json(200, &idp.jwks()));
        (ClaimsValidator::new(&provider_config(), transport.clone()), transport)
    }

    fn assert_invalid_token(result: Result<String, AuthError>) {
        match result {
            Err(AuthError::InvalidToken(_)) => {}
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_token_yields_username_claim() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let token = idp.sign(&idp.claims());

        assert_eq!(validator.validate(&token).await.unwrap(), "alice@example.com");
    }

    #[tokio::test]
    async fn token_without_kid_is_matched_by_algorithm() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let token = idp.sign_with_header(Header::new(Algorithm::RS256), &idp.claims());

        assert_eq!(validator.validate(&token).await.unwrap(), "alice@example.com");
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["exp"] = json!(now() - 120);

        assert_invalid_token(validator.validate(&idp.sign(&claims)).await);
    }

    #[tokio::test]
    async fn expiry_within_clock_skew_accepted() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["exp"] = json!(now() - 10);

        assert!(validator.validate(&idp.sign(&claims)).await.is_ok());
    }

    #[tokio::test]
    async fn far_future_expiry_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["exp"] = json!(now() + MAX_FUTURE_VALIDITY_SECS + 600);

        assert_invalid_token(validator.validate(&idp.sign(&claims)).await);
    }

    #[tokio::test]
    async fn not_yet_valid_token_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["nbf"] = json!(now() + 600);

        assert_invalid_token(validator.validate(&idp.sign(&claims)).await);
    }

    #[tokio::test]
    async fn wrong_issuer_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["iss"] = json!("https://idp.example");

        assert_invalid_token(validator.validate(&idp.sign(&claims)).await);
    }

    #[tokio::test]
    async fn wrong_audience_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["aud"] = json!("someone-else");

        assert_invalid_token(validator.validate(&idp.sign(&claims)).await);
    }

    #[tokio::test]
    async fn audience_list_containing_client_accepted() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["aud"] = json!(["someone-else", "abc123"]);

        assert!(validator.validate(&idp.sign(&claims)).await.is_ok());
    }

    #[tokio::test]
    async fn missing_subject_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims.as_object_mut().unwrap().remove("sub");

        assert_invalid_token(validator.validate(&idp.sign(&claims)).await);
    }

    #[tokio::test]
    async fn missing_username_claim_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims.as_object_mut().unwrap().remove("email");

        assert_invalid_token(validator.validate(&idp.sign(&claims)).await);
    }

    #[tokio::test]
    async fn non_string_username_claim_is_internal_error() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut claims = idp.claims();
        claims["email"] = json!({ "primary": "alice@example.com" });

        let result = validator.validate(&idp.sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::ValidationInternal(_))));
    }

    #[tokio::test]
    async fn tampered_token_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let token = idp.sign(&idp.claims());

        let len = token.len();
        let last = token.as_bytes()[len - 1];
        let replacement = if last == b'A' { b'B' } else { b'A' };
        let mut bytes = token.into_bytes();
        bytes[len - 1] = replacement;
        let token = String::from_utf8(bytes).unwrap();

        assert_invalid_token(validator.validate(&token).await);
    }

    #[tokio::test]
    async fn token_from_other_key_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("unknown-kid".to_string());

        assert_invalid_token(
            validator
                .validate(&idp.sign_with_header(header, &idp.claims()))
                .await,
        );
    }

    #[tokio::test]
    async fn algorithm_mismatch_rejected() {
        let idp = TestIdp::new();
        let (validator, _) = validator(&idp);
        let mut header = Header::new(Algorithm::RS512);
        header.kid = Some(idp.kid.clone());

        assert_invalid_token(
            validator
                .validate(&idp.sign_with_header(header, &idp.claims()))
                .await,
        );
    }

    #[tokio::test]
    async fn garbage_input_rejected() {
        let idp = TestIdp::new();
        let (validator, transport) = validator(&idp);

        assert_invalid_token(validator.validate("not-a-jwt").await);
        assert_invalid_token(validator.validate("").await);
        // Structure is checked before any key fetch.
        assert_eq!(transport.request_count(JWKS_URL), 0);
    }

    #[tokio::test]
    async fn unreachable_key_set_rejects_token() {
        let idp = TestIdp::new();
        let transport = Arc::new(StaticTransport::new());
        let validator = ClaimsValidator::new(&provider_config(), transport);

        assert_invalid_token(validator.validate(&idp.sign(&idp.claims())).await);
    }

    #[tokio::test]
    async fn cached_keys_survive_provider_outage() {
        let idp = TestIdp::new();
        let (validator, transport) = validator(&idp);
        let validator = validator.with_key_cache_ttl(Duration::from_secs(300));
        let token = idp.sign(&idp.claims());

        validator.validate(&token).await.unwrap();
        transport.forget(JWKS_URL);
        assert_eq!(validator.validate(&token).await.unwrap(), "alice@example.com");
    }
}
