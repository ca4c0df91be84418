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

//! Login challenges: the fields an unauthenticated caller must supply and the
//! provider authorization URI that obtains them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;

/// Scopes requested from the provider, already percent-encoded.
const SCOPE: &str = "openid%20email%20profile";

/// Query parameter carrying an ID token (implicit flow).
pub const TOKEN_PARAMETER: &str = "token";
/// Query parameter carrying an authorization code (code flow).
pub const CODE_PARAMETER: &str = "code";
pub const USERNAME_PARAMETER: &str = "username";
pub const PASSWORD_PARAMETER: &str = "password";

/// Which OAuth flow a deployment offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowVariant {
    /// The provider returns the ID token directly in the redirect.
    ImplicitToken,
    /// The provider returns a code that is exchanged server-side.
    AuthorizationCode,
}

impl FlowVariant {
    /// Value of the `response_type` authorization parameter.
    pub fn response_type(self) -> &'static str {
        match self {
            FlowVariant::ImplicitToken => "token",
            FlowVariant::AuthorizationCode => "code",
        }
    }
}

impl fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.response_type())
    }
}

impl FromStr for FlowVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" | "implicit" | "implicit_token" => Ok(FlowVariant::ImplicitToken),
            "code" | "authorization_code" => Ok(FlowVariant::AuthorizationCode),
            other => Err(format!("unknown OAuth flow '{other}', expected 'token' or 'code'")),
        }
    }
}

/// Kind of input a [`Field`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Username,
    Password,
    /// Filled by redirecting to the provider, which returns an ID token.
    #[serde(rename = "GUAC_OAUTH_TOKEN")]
    OAuthToken,
    /// Filled by redirecting to the provider, which returns a code.
    #[serde(rename = "GUAC_OAUTH_CODE")]
    OAuthCode,
}

/// Declarative description of one input the host must collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Request parameter the value is submitted under.
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Where to send the user to obtain the value (OAuth fields only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_uri: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            authorization_uri: None,
        }
    }

    pub fn with_authorization_uri(mut self, uri: String) -> Self {
        self.authorization_uri = Some(uri);
        self
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self.field_type, FieldType::OAuthToken | FieldType::OAuthCode)
    }
}

/// What an unauthenticated caller must supply next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub fields: Vec<Field>,
}

impl AuthChallenge {
    /// The provider redirect, if this challenge has one.
    pub fn authorization_uri(&self) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|field| field.authorization_uri.as_deref())
    }
}

/// Build the provider authorization URI for `variant`.
///
/// Client ID and redirect URI are percent-encoded (`a b&c` becomes
/// `a%20b%26c`).
pub fn authorization_uri(config: &ProviderConfig, variant: FlowVariant) -> String {
    let separator = if config.authorization_endpoint.contains('?') {
        '&'
    } else {
        '?'
    };
    format!(
        "{endpoint}{separator}scope={SCOPE}&response_type={response_type}&client_id={client_id}&redirect_uri={redirect_uri}",
        endpoint = config.authorization_endpoint,
        response_type = variant.response_type(),
        client_id = urlencoding::encode(&config.client_id),
        redirect_uri = urlencoding::encode(&config.redirect_uri),
    )
}

/// Build the challenge presented to callers without credentials.
///
/// The implicit flow asks for the token alone. The code flow also lists
/// username and password ahead of the code field so existing login forms keep
/// rendering; their values are never inspected.
pub fn build_challenge(config: &ProviderConfig, variant: FlowVariant) -> AuthChallenge {
    let uri = authorization_uri(config, variant);
    let fields = match variant {
        FlowVariant::ImplicitToken => vec![
            Field::new(TOKEN_PARAMETER, FieldType::OAuthToken).with_authorization_uri(uri),
        ],
        FlowVariant::AuthorizationCode => vec![
            Field::new(USERNAME_PARAMETER, FieldType::Username),
            Field::new(PASSWORD_PARAMETER, FieldType::Password),
            Field::new(CODE_PARAMETER, FieldType::OAuthCode).with_authorization_uri(uri),
        ],
    };
    AuthChallenge { fields }
}
