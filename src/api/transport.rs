//! The raw HTTP seam under the request layer.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
}

impl Method {
  pub fn as_str(self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A fully resolved request, ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub method: Method,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub body: Option<Value>,
}

#[cfg(test)]
impl HttpRequest {
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub body: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// The request never produced a response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Sends one HTTP request. Implementations do not retry.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new() -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("winix/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| TransportError(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
    };

    let mut builder = self.client.request(method, request.url.as_str());
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
      let bytes = serde_json::to_vec(body)
        .map_err(|e| TransportError(format!("failed to encode body: {}", e)))?;
      builder = builder.body(bytes);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| TransportError(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| TransportError(format!("failed to read body: {}", e)))?;

    Ok(HttpResponse { status, body })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_reqwest_transport_sends_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/auth"))
      .and(header("X-User-Id", "42"))
      .and(body_json(json!({"telegram_id": "42"})))
      .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"status":"success"}"#))
      .expect(1)
      .mount(&server)
      .await;

    let transport = ReqwestTransport::new().unwrap();
    let response = transport
      .send(HttpRequest {
        method: Method::Post,
        url: Url::parse(&format!("{}/api/auth", server.uri())).unwrap(),
        headers: vec![
          ("Content-Type".to_string(), "application/json".to_string()),
          ("X-User-Id".to_string(), "42".to_string()),
        ],
        body: Some(json!({"telegram_id": "42"})),
      })
      .await
      .unwrap();

    assert_eq!(response.status, 201);
    assert!(response.is_success());
    assert_eq!(response.body, r#"{"status":"success"}"#);
  }

  #[tokio::test]
  async fn test_reqwest_transport_reports_error_status_as_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/ping"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let transport = ReqwestTransport::new().unwrap();
    let response = transport
      .send(HttpRequest {
        method: Method::Get,
        url: Url::parse(&format!("{}/api/ping", server.uri())).unwrap(),
        headers: Vec::new(),
        body: None,
      })
      .await
      .unwrap();

    assert_eq!(response.status, 503);
    assert!(!response.is_success());
  }

  #[test]
  fn test_header_lookup_ignores_case() {
    let request = HttpRequest {
      method: Method::Get,
      url: Url::parse("https://example.com").unwrap(),
      headers: vec![("X-User-Id".to_string(), "7".to_string())],
      body: None,
    };
    assert_eq!(request.header("x-user-id"), Some("7"));
    assert_eq!(request.header("Authorization"), None);
  }
}
