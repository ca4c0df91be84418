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

//! OAuth authentication gateway entry point.
//!
//! A standalone Axum service that answers `GET /api/authenticate` with either
//! the authenticated username or the login challenge for the configured
//! identity provider.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use oauth_gate::auth::Authenticator;
use oauth_gate::config::{ProviderConfig, ServerConfig};
use oauth_gate::http::ReqwestTransport;
use oauth_gate::routes;
use oauth_gate::state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env().context("failed to load server configuration")?;
    let provider = ProviderConfig::from_source(&config.property_source()?)
        .context("failed to load OAuth provider configuration")?;

    tracing::info!(
        "Using {} flow with issuer {} and client {}",
        config.flow,
        provider.issuer,
        provider.client_id
    );

    let mut authenticator =
        Authenticator::new(provider, config.flow, Arc::new(ReqwestTransport::new()));
    if let Some(ttl) = config.jwks_cache_ttl {
        tracing::info!("Caching JWKS for {}s", ttl.as_secs());
        authenticator = authenticator.with_key_cache_ttl(ttl);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState::new(authenticator);
    let app = routes::router().layer(cors).with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!("OAuth gate listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
