//! Verb-level HTTP executor.
//!
//! Every call resolves to a [`Response`]; transport faults never escape as
//! errors. Policy (status interpretation, decoding) lives in the callers.

use crate::Result;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use tracing::debug;

pub(crate) const JSON_MEDIA_TYPE: &str = "application/json";
pub(crate) const MERGE_PATCH_MEDIA_TYPE: &str = "application/merge-patch+json";

/// Outcome of a single HTTP exchange.
///
/// A `status` of `0` means the request never produced a server response
/// (DNS, TLS, connection or body-read failure).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The sentinel for a request that got no server response.
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Stateless HTTP executor shared by the client, sessions and entities.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
}

impl Transport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn get(&self, url: &str, token: Option<&str>) -> Response {
        self.execute(self.request(Method::GET, url, token)).await
    }

    pub async fn post(&self, url: &str, token: Option<&str>, body: &serde_json::Value) -> Response {
        let builder = self.request(Method::POST, url, token);
        self.execute(with_body(builder, body, JSON_MEDIA_TYPE)).await
    }

    pub async fn patch(
        &self,
        url: &str,
        token: Option<&str>,
        body: &serde_json::Value,
    ) -> Response {
        let builder = self.request(Method::PATCH, url, token);
        self.execute(with_body(builder, body, MERGE_PATCH_MEDIA_TYPE))
            .await
    }

    pub async fn delete(&self, url: &str, token: Option<&str>) -> Response {
        self.execute(self.request(Method::DELETE, url, token)).await
    }

    /// Plain GET without JSON negotiation, for raw file downloads.
    pub async fn download(&self, url: &str, token: Option<&str>) -> Response {
        let mut builder = self.http.get(url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        self.execute(builder).await
    }

    /// The underlying client, for long-lived streaming requests.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn execute(&self, builder: RequestBuilder) -> Response {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "request failed before a response arrived");
                return Response::failed();
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => Response::new(status, body.to_vec()),
            Err(err) => {
                debug!(status, error = %err, "failed to read response body");
                Response::failed()
            }
        }
    }
}

fn with_body(
    builder: RequestBuilder,
    body: &serde_json::Value,
    media_type: &'static str,
) -> RequestBuilder {
    builder
        .header(CONTENT_TYPE, HeaderValue::from_static(media_type))
        .body(body.to_string())
}
