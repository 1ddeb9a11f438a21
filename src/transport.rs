//! HTTP transport abstraction.
//!
//! All traffic to the token endpoint and the grid service goes through [`HttpClient`],
//! so tests can swap in a scripted client. Non-success statuses are returned as data;
//! only failures that never produced a response become errors.

use bytes::Bytes;
use std::time::Duration;

use crate::error::{Result, WiwbError};

/// A complete HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as (lossy) UTF-8, for diagnostics
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for the blocking HTTP calls the engine makes.
pub trait HttpClient: Send + Sync {
    /// POST a form-encoded body
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse>;

    /// POST a JSON body with extra headers
    fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;
}

/// Real HTTP client implementation using blocking reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client whose requests give up after `timeout_secs`.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| WiwbError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    fn finish(url: &str, response: reqwest::blocking::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| WiwbError::Transport {
            message: format!("Failed to read response from {}: {}", url, e),
        })?;
        Ok(HttpResponse { status, body })
    }
}

impl HttpClient for ReqwestClient {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .map_err(|e| WiwbError::Transport {
                message: format!("Request to {} failed: {}", url, e),
            })?;

        Self::finish(url, response)
    }

    fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().map_err(|e| WiwbError::Transport {
            message: format!("Request to {} failed: {}", url, e),
        })?;

        Self::finish(url, response)
    }
}
