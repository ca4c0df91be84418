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

//! OAuth2/OIDC provider interaction: JWKS resolution, ID token verification,
//! and authorization code exchange.

pub mod claims;
pub mod exchange;
pub mod jwks;
pub mod verify;

pub use claims::IdTokenClaims;
pub use exchange::{TokenExchanger, TokenResponse};
pub use jwks::{KeySet, KeySetError, KeySetResolver};
pub use verify::{ClaimsValidator, AUDIT_TARGET};
