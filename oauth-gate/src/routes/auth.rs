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

//! GET /api/authenticate

use axum::{extract::State, Json};

use crate::auth::{AuthOutcome, InboundCredentials};
use crate::error::AppError;
use crate::response::{APIResponse, AuthenticatedResponse};
use crate::state::AppState;

/// Authenticate the caller from the `token` or `code` query parameter.
///
/// Returns 200 with the username on success. A caller presenting neither gets
/// a 401 whose body lists the fields to collect, including the provider
/// redirect; rejected credentials get a bare 401.
pub async fn authenticate(
    State(state): State<AppState>,
    credentials: InboundCredentials,
) -> Result<Json<APIResponse<AuthenticatedResponse>>, AppError> {
    match state.authenticator.authenticate(credentials).await? {
        AuthOutcome::Authenticated(identity) => Ok(Json(APIResponse::ok(AuthenticatedResponse {
            username: identity.username,
            provider: state.authenticator.identifier().to_string(),
        }))),
        AuthOutcome::Challenge(challenge) => Err(AppError::challenge(challenge.fields)),
    }
}
