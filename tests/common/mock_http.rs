//! Scripted transport for driving a [`Client`] without a network.
//!
//! Token requests are answered with a JWT whose lifetime is configurable; JSON requests
//! are recorded and answered from a queue, then from a fallback reply.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wiwb::auth::Session;
use wiwb::transport::{HttpClient, HttpResponse};
use wiwb::{Client, ReconcilerConfig};

pub const TOKEN_URL: &str = "https://login.test/token";
pub const BASE_URL: &str = "https://wiwb.test/api";

/// A JSON request the client sent
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct MockHttp {
    token_lifetime: i64,
    token_status: u16,
    token_requests: AtomicUsize,
    replies: Mutex<VecDeque<HttpResponse>>,
    fallback: Mutex<Option<HttpResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for MockHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHttp {
    /// A transport handing out tokens valid for an hour
    pub fn new() -> Self {
        Self {
            token_lifetime: 3600,
            token_status: 200,
            token_requests: AtomicUsize::new(0),
            replies: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Tokens expire `secs` seconds after they are issued
    pub fn with_token_lifetime(mut self, secs: i64) -> Self {
        self.token_lifetime = secs;
        self
    }

    /// The token endpoint rejects every request with `status`
    pub fn with_token_status(mut self, status: u16) -> Self {
        self.token_status = status;
        self
    }

    /// Queue a reply for the next JSON request
    pub fn reply(self, response: HttpResponse) -> Self {
        self.replies.lock().push_back(response);
        self
    }

    /// Reply used once the queue is empty
    pub fn otherwise(self, response: HttpResponse) -> Self {
        *self.fallback.lock() = Some(response);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn last_body(&self) -> Option<serde_json::Value> {
        self.requests.lock().last().map(|r| r.body.clone())
    }
}

/// A JWT with the given expiry; only the payload is ever inspected
pub fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"azp":"test"}}"#, exp));
    format!("{}.{}.signature", header, payload)
}

impl HttpClient for MockHttp {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> wiwb::Result<HttpResponse> {
        assert_eq!(url, TOKEN_URL);
        assert!(form.contains(&("grant_type", "client_credentials")));
        self.token_requests.fetch_add(1, Ordering::SeqCst);

        if self.token_status != 200 {
            return Ok(HttpResponse::new(self.token_status, "invalid_client"));
        }
        let token = jwt(Utc::now().timestamp() + self.token_lifetime);
        Ok(HttpResponse::new(
            200,
            format!(r#"{{"access_token":"{}","token_type":"Bearer"}}"#, token),
        ))
    }

    fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> wiwb::Result<HttpResponse> {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.clone(),
        });

        let queued = self.replies.lock().pop_front();
        Ok(queued
            .or_else(|| self.fallback.lock().clone())
            .unwrap_or_else(|| HttpResponse::new(500, "no reply scripted")))
    }
}

/// A client over the mock transport with the default reconciler
pub fn mock_client(http: Arc<MockHttp>) -> Client {
    let session = Session::new(
        Some("test-client".to_string()),
        Some("test-secret".to_string()),
        TOKEN_URL,
        http.clone(),
    )
    .expect("Failed to create session");

    Client::new(
        Arc::new(session),
        http,
        BASE_URL,
        ReconcilerConfig::default(),
    )
}
