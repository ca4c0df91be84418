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

//! HTTP capability used to reach the identity provider.
//!
//! The authentication core never builds its own client: a [`HttpTransport`] is
//! passed in at construction. [`ReqwestTransport`] is the production
//! implementation; [`StaticTransport`] serves canned responses from memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

/// A failed HTTP round trip (connection, TLS, or body read).
#[derive(Debug, Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text for logging; invalid UTF-8 is replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outbound HTTP calls made during authentication.
///
/// A non-success status is not an error at this layer; callers inspect
/// [`HttpResponse::status`] themselves.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `form` as `application/x-www-form-urlencoded`, accepting JSON.
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError>;

    /// GET `url`, accepting JSON.
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
///
/// No timeout is configured beyond reqwest's defaults.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn collect(url: &str, resp: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::new(url, format!("failed to read body: {e}")))?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| TransportError::new(url, e.to_string()))?;
        Self::collect(url, resp).await
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TransportError::new(url, e.to_string()))?;
        Self::collect(url, resp).await
    }
}

/// A request observed by [`StaticTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub form: Vec<(String, String)>,
}

/// In-memory [`HttpTransport`] returning canned responses per URL.
///
/// Unregistered URLs fail with a [`TransportError`], which stands in for an
/// unreachable provider. Every request is recorded.
#[derive(Debug, Clone, Default)]
pub struct StaticTransport {
    responses: Arc<Mutex<HashMap<String, HttpResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the response for `url`, replacing any earlier one.
    pub fn respond(&self, url: impl Into<String>, response: HttpResponse) -> &Self {
        lock(&self.responses).insert(url.into(), response);
        self
    }

    pub fn forget(&self, url: &str) {
        lock(&self.responses).remove(url);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.url == url).count()
    }

    fn reply(&self, request: RecordedRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        lock(&self.requests).push(request);
        lock(&self.responses)
            .get(&url)
            .cloned()
            .ok_or_else(|| TransportError::new(&url, "connection refused"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl HttpTransport for StaticTransport {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.reply(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.reply(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            form: Vec::new(),
        })
    }
}
