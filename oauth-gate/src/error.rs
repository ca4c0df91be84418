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

//! Error types.
//!
//! [`AuthError`] is what the authentication core returns. [`AppError`] is the
//! HTTP-facing wrapper used by the host binary: every failure is returned as
//! `APIResponse<APIError>` with `success: false`, and the caller only ever sees
//! "Invalid login." regardless of what went wrong underneath.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::challenge::Field;
use crate::response::{APIError, APIResponse};

/// Message shown to callers for every authentication failure.
pub const INVALID_LOGIN: &str = "Invalid login.";

/// Errors produced while authenticating a request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required configuration property is absent or blank.
    #[error("required configuration property \"{0}\" is missing")]
    ConfigurationMissing(String),

    /// A configuration property is present but unusable.
    #[error("configuration property \"{property}\" is invalid: {detail}")]
    ConfigurationInvalid { property: String, detail: String },

    /// No usable token or code was presented.
    #[error("no usable credentials were presented")]
    InvalidCredentials,

    /// The token endpoint could not be reached or refused the exchange.
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    /// The ID token failed signature, expiry, issuer, audience or username checks.
    #[error("invalid ID token: {0}")]
    InvalidToken(String),

    /// The ID token verified but its claims could not be read.
    #[error("unable to parse ID token claims: {0}")]
    ValidationInternal(String),
}

impl AuthError {
    /// `true` when the failure lies with this service or the provider rather
    /// than with the credentials the caller presented.
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            AuthError::ConfigurationMissing(_)
                | AuthError::ConfigurationInvalid { .. }
                | AuthError::ExchangeFailed(_)
                | AuthError::ValidationInternal(_)
        )
    }
}

/// Application-level error that pairs an HTTP status code with an [`APIError`].
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: APIError,
}

impl AppError {
    pub fn new(status: StatusCode, body: APIError) -> Self {
        Self { status, body }
    }

    /// 401 carrying the fields the caller must supply next.
    pub fn challenge(fields: Vec<Field>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            APIError::invalid_login().with_fields(fields),
        )
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, APIError::server_error())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_server_fault() {
            tracing::error!("Authentication failed with server fault: {err}");
            Self::internal()
        } else {
            Self::new(StatusCode::UNAUTHORIZED, APIError::invalid_login())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = APIResponse::error(self.body);
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    use crate::challenge::FieldType;

    async fn read_error_body(resp: Response) -> (StatusCode, APIResponse<APIError>) {
        let status = resp.status();
        let bytes = Body::new(resp.into_body())
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        let parsed: APIResponse<APIError> =
            serde_json::from_slice(&bytes).expect("deserialize error body");
        (status, parsed)
    }

    #[test]
    fn credential_problems_are_not_server_faults() {
        assert!(!AuthError::InvalidCredentials.is_server_fault());
        assert!(!AuthError::InvalidToken("expired".into()).is_server_fault());
        assert!(AuthError::ExchangeFailed("502".into()).is_server_fault());
        assert!(AuthError::ValidationInternal("aud".into()).is_server_fault());
        assert!(AuthError::ConfigurationMissing("oauth-issuer".into()).is_server_fault());
    }

    #[tokio::test]
    async fn invalid_token_maps_to_401_without_detail() {
        let err: AppError = AuthError::InvalidToken("signature mismatch".into()).into();
        let (status, body) = read_error_body(err.into_response()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.success);
        assert_eq!(body.result.code, "INVALID_LOGIN");
        assert_eq!(body.result.message, INVALID_LOGIN);
        assert!(body.result.fields.is_none());
    }

    #[tokio::test]
    async fn exchange_failure_maps_to_500_with_same_message() {
        let err: AppError = AuthError::ExchangeFailed("provider said: bad secret".into()).into();
        let (status, body) = read_error_body(err.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.result.code, "SERVER_ERROR");
        assert_eq!(body.result.message, INVALID_LOGIN);
    }

    #[tokio::test]
    async fn challenge_carries_fields() {
        let field = Field::new("token", FieldType::OAuthToken)
            .with_authorization_uri("https://idp.example/auth?scope=openid".to_string());
        let (status, body) = read_error_body(AppError::challenge(vec![field]).into_response()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let fields = body.result.fields.expect("challenge fields");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "token");
    }
}
