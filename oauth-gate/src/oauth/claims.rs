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

//! ID token claims.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Claims of a verified ID token.
///
/// Kept as a raw JSON object because the username claim is chosen by
/// configuration rather than fixed at compile time.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct IdTokenClaims(Map<String, Value>);

impl IdTokenClaims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// `exp` as seconds since the epoch.
    pub fn expires_at(&self) -> Option<u64> {
        match self.0.get("exp")? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            _ => None,
        }
    }

    /// Read the username from `claim`.
    ///
    /// An absent, null or empty claim means the token does not identify a
    /// user and is rejected as [`AuthError::InvalidToken`]. A claim of any
    /// other JSON type is a structural fault: [`AuthError::ValidationInternal`].
    pub fn username(&self, claim: &str) -> Result<String, AuthError> {
        match self.0.get(claim) {
            None | Some(Value::Null) => Err(AuthError::InvalidToken(format!(
                "username claim \"{claim}\" is missing"
            ))),
            Some(Value::String(s)) if s.is_empty() => Err(AuthError::InvalidToken(format!(
                "username claim \"{claim}\" is empty"
            ))),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(AuthError::ValidationInternal(format!(
                "username claim \"{claim}\" is not a string"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> IdTokenClaims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn username_is_read_from_configured_claim() {
        let c = claims(json!({ "email": "alice@example.com", "sub": "1234" }));
        assert_eq!(c.username("email").unwrap(), "alice@example.com");
        assert_eq!(c.username("sub").unwrap(), "1234");
    }

    #[test]
    fn missing_or_empty_username_is_invalid_token() {
        let c = claims(json!({ "sub": "1234", "email": "", "nick": null }));
        assert!(matches!(c.username("preferred_username"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(c.username("email"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(c.username("nick"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn non_string_username_is_internal_error() {
        let c = claims(json!({ "email": ["a@example.com"], "age": 42 }));
        assert!(matches!(c.username("email"), Err(AuthError::ValidationInternal(_))));
        assert!(matches!(c.username("age"), Err(AuthError::ValidationInternal(_))));
    }

    #[test]
    fn expiry_accepts_integer_and_float() {
        assert_eq!(claims(json!({ "exp": 1700000000 })).expires_at(), Some(1_700_000_000));
        assert_eq!(claims(json!({ "exp": 1700000000.5 })).expires_at(), Some(1_700_000_000));
        assert_eq!(claims(json!({ "exp": "soon" })).expires_at(), None);
    }

    #[test]
    fn non_object_payload_does_not_deserialize() {
        assert!(serde_json::from_value::<IdTokenClaims>(json!(["not", "claims"])).is_err());
    }
}
