//! Backend HTTP client.
//!
//! Implements [`HttpPort`].  Each request opens a fresh connection, sends
//! one POST and reads back only the status code.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` behind the
//!   `embedded_svc` blocking client.
//! - **all other targets**: records requests and answers with a scripted
//!   status.

use crate::app::ports::{HttpPort, PostRequest};
use crate::error::NetworkError;

#[cfg(target_os = "espidf")]
use core::time::Duration;

#[cfg(target_os = "espidf")]
use embedded_svc::http::{Method, Status as _};
#[cfg(target_os = "espidf")]
use embedded_svc::http::client::Client;
#[cfg(target_os = "espidf")]
use embedded_svc::io::Write;
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

const CONTENT_TYPE_JSON: &str = "application/json";

#[cfg(target_os = "espidf")]
pub struct HttpAdapter {
    timeout_ms: u32,
}

#[cfg(target_os = "espidf")]
impl HttpAdapter {
    pub fn new(timeout_ms: u32) -> Self {
        Self { timeout_ms }
    }
}

#[cfg(target_os = "espidf")]
impl HttpPort for HttpAdapter {
    fn post_json(&mut self, request: &PostRequest<'_>) -> Result<u16, NetworkError> {
        if request.url.is_empty() {
            return Err(NetworkError::NoEndpoint);
        }
        let config = Configuration {
            timeout: Some(Duration::from_millis(u64::from(self.timeout_ms))),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config).map_err(|_| NetworkError::Request)?;
        let mut client = Client::wrap(connection);

        let content_length = request.body.len().to_string();
        let headers = [
            ("Authorization", request.authorization),
            ("Content-Type", CONTENT_TYPE_JSON),
            ("Content-Length", content_length.as_str()),
        ];
        let mut req = client
            .request(Method::Post, request.url, &headers)
            .map_err(|_| NetworkError::Request)?;
        req.write_all(request.body.as_bytes()).map_err(|_| NetworkError::Request)?;
        req.flush().map_err(|_| NetworkError::Request)?;
        let response = req.submit().map_err(|_| NetworkError::Request)?;
        Ok(response.status())
    }
}

/// One captured request.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub authorization: String,
    pub content_type: &'static str,
    pub body: String,
}

/// Host-side HTTP client that records requests.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct HttpAdapter {
    requests: Vec<RecordedRequest>,
    replies: std::collections::VecDeque<Result<u16, NetworkError>>,
}

#[cfg(not(target_os = "espidf"))]
impl HttpAdapter {
    pub fn new(_timeout_ms: u32) -> Self {
        Self::default()
    }

    /// Queue the outcome of the next request; unscripted requests get 200.
    pub fn reply_with(&mut self, reply: Result<u16, NetworkError>) {
        self.replies.push_back(reply);
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpPort for HttpAdapter {
    fn post_json(&mut self, request: &PostRequest<'_>) -> Result<u16, NetworkError> {
        if request.url.is_empty() {
            return Err(NetworkError::NoEndpoint);
        }
        self.requests.push(RecordedRequest {
            url: request.url.to_owned(),
            authorization: request.authorization.to_owned(),
            content_type: CONTENT_TYPE_JSON,
            body: request.body.to_owned(),
        });
        self.replies.pop_front().unwrap_or(Ok(200))
    }
}
