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

//! Authorization code → token exchange.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::http::HttpTransport;

/// Response from the OAuth token endpoint. Unknown fields are ignored.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds. Numeric strings are accepted;
    /// anything else unreadable is treated as absent.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("TokenResponse")
            .field("access_token", &present(&self.access_token))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("id_token", &present(&self.id_token))
            .finish()
    }
}

/// Trades authorization codes for tokens at the provider's token endpoint.
pub struct TokenExchanger {
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    transport: Arc<dyn HttpTransport>,
}

impl TokenExchanger {
    pub fn new(config: &ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            transport,
        }
    }

    /// Exchange `code` in a single POST, without retry.
    pub async fn exchange(&self, code: &str) -> Result<TokenResponse, AuthError> {
        if code.trim().is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self
            .transport
            .post_form(&self.token_endpoint, &params)
            .await
            .map_err(|e| {
                tracing::error!("OAuth token request failed: {e}");
                AuthError::ExchangeFailed(e.to_string())
            })?;

        if !resp.is_success() {
            let status = resp.status;
            tracing::error!("OAuth token endpoint returned HTTP {status}");
            tracing::debug!("OAuth token endpoint error body: {}", resp.body_text());
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let token: TokenResponse = serde_json::from_slice(&resp.body).map_err(|e| {
            tracing::error!("Failed to parse OAuth token response: {e}");
            AuthError::ExchangeFailed(format!("unparseable token response: {e}"))
        })?;

        if let Some(token_type) = token.token_type.as_deref() {
            if !token_type.eq_ignore_ascii_case("bearer") {
                tracing::warn!("OAuth token endpoint returned unexpected token_type {token_type:?}");
            }
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{HttpResponse, StaticTransport};
    use crate::testing::{provider_config, TOKEN_URL};

    fn exchanger(transport: &Arc<StaticTransport>) -> TokenExchanger {
        TokenExchanger::new(&provider_config(), transport.clone())
    }

    #[tokio::test]
    async fn posts_expected_form() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond(
            TOKEN_URL,
            HttpResponse::json(
                200,
                &json!({
                    "access_token": "at-1",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "id_token": "header.payload.sig",
                    "scope": "openid email profile",
                }),
            ),
        );

        let token = exchanger(&transport).exchange("auth-code-1").await.unwrap();
        assert_eq!(token.id_token.as_deref(), Some("header.payload.sig"));
        assert_eq!(token.expires_in, Some(3600));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        let form: Vec<(&str, &str)> = requests[0]
            .form
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            form,
            [
                ("code", "auth-code-1"),
                ("client_id", "abc123"),
                ("client_secret", "s3cret"),
                ("redirect_uri", "https://app.example/login"),
                ("grant_type", "authorization_code"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_code_is_invalid_credentials() {
        let transport = Arc::new(StaticTransport::new());
        let result = exchanger(&transport).exchange("").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn error_status_is_exchange_failure() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond(
            TOKEN_URL,
            HttpResponse::json(400, &json!({ "error": "invalid_grant" })),
        );
        match exchanger(&transport).exchange("used-code").await {
            Err(AuthError::ExchangeFailed(detail)) => assert!(!detail.contains("invalid_grant")),
            other => panic!("expected ExchangeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_exchange_failure() {
        let transport = Arc::new(StaticTransport::new());
        let result = exchanger(&transport).exchange("code").await;
        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
    }

    #[tokio::test]
    async fn unparseable_body_is_exchange_failure() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond(TOKEN_URL, HttpResponse::new(200, "<html>oops</html>"));
        let result = exchanger(&transport).exchange("code").await;
        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
    }

    #[tokio::test]
    async fn unexpected_token_type_is_tolerated() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond(
            TOKEN_URL,
            HttpResponse::json(200, &json!({ "token_type": "mac", "id_token": "t" })),
        );
        let token = exchanger(&transport).exchange("code").await.unwrap();
        assert_eq!(token.token_type.as_deref(), Some("mac"));
        assert!(token.access_token.is_none());
    }

    #[tokio::test]
    async fn expires_in_as_string_is_accepted() {
        let transport = Arc::new(StaticTransport::new());
        transport.respond(
            TOKEN_URL,
            HttpResponse::json(
                200,
                &json!({ "token_type": "Bearer", "expires_in": "3599", "id_token": "t" }),
            ),
        );
        let token = exchanger(&transport).exchange("code").await.unwrap();
        assert_eq!(token.expires_in, Some(3599));
        assert_eq!(token.id_token.as_deref(), Some("t"));
    }

    #[test]
    fn unreadable_expires_in_counts_as_absent() {
        for body in [
            r#"{"expires_in": null}"#,
            r#"{"expires_in": "soon"}"#,
            r#"{"expires_in": -5}"#,
            r#"{"expires_in": {"seconds": 10}}"#,
        ] {
            let token: TokenResponse = serde_json::from_str(body).unwrap();
            assert_eq!(token.expires_in, None, "{body}");
        }
        let token: TokenResponse = serde_json::from_str(r#"{"expires_in": 60}"#).unwrap();
        assert_eq!(token.expires_in, Some(60));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let token = TokenResponse {
            access_token: Some("at-secret".to_string()),
            id_token: Some("id-secret".to_string()),
            ..Default::default()
        };
        let printed = format!("{token:?}");
        assert!(!printed.contains("secret"));
    }
}
