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

//! Response envelope for the host API.
//!
//! Every endpoint returns an [`APIResponse<T>`] envelope:
//! - On success: `{ "success": true,  "result": <T> }`
//! - On failure: `{ "success": false, "result": <APIError> }`

use serde::{Deserialize, Serialize};

use crate::challenge::Field;
use crate::error::INVALID_LOGIN;

/// Top-level API response envelope.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct APIResponse<A: Serialize> {
    pub success: bool,
    pub result: A,
}

impl<A: Serialize> APIResponse<A> {
    /// Wrap a successful result.
    pub fn ok(result: A) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

impl APIResponse<APIError> {
    /// Wrap an error result.
    pub fn error(err: APIError) -> Self {
        Self {
            success: false,
            result: err,
        }
    }
}

/// Structured error returned in the `result` field of a failed [`APIResponse`].
///
/// `fields` is only present when the caller is being challenged for
/// credentials; the host renders them as its login form.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct APIError {
    /// Machine-readable error code (`"INVALID_LOGIN"` or `"SERVER_ERROR"`).
    pub code: String,

    /// Human-readable error message.
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
}

impl APIError {
    pub fn invalid_login() -> Self {
        Self {
            code: "INVALID_LOGIN".to_string(),
            message: INVALID_LOGIN.to_string(),
            fields: None,
        }
    }

    pub fn server_error() -> Self {
        Self {
            code: "SERVER_ERROR".to_string(),
            message: INVALID_LOGIN.to_string(),
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Payload for a successful `GET /api/authenticate`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthenticatedResponse {
    pub username: String,
    pub provider: String,
}
