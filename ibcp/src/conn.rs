// ibcp/src/conn.rs

use std::fmt;
use log::{debug, trace, warn};
use serde_json::Value;
use crate::base::IBKRError;
use crate::conn_log::ConnectionLogger;
pub use http::HttpConnection;

/// HTTP verbs used by the Client Portal endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
  Get,
  Post,
  Delete,
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HttpMethod::Get => write!(f, "GET"),
      HttpMethod::Post => write!(f, "POST"),
      HttpMethod::Delete => write!(f, "DELETE"),
    }
  }
}

/// A single call against the gateway. `path` is relative to `/v1/api/`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: HttpMethod,
  pub path: String,
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl ApiRequest {
  fn new(method: HttpMethod, path: impl Into<String>) -> Self {
    ApiRequest { method, path: path.into(), query: Vec::new(), body: None }
  }

  pub fn get(path: impl Into<String>) -> Self { Self::new(HttpMethod::Get, path) }
  pub fn post(path: impl Into<String>) -> Self { Self::new(HttpMethod::Post, path) }
  pub fn delete(path: impl Into<String>) -> Self { Self::new(HttpMethod::Delete, path) }

  /// Append a query parameter. Repeating a key sends it multiple times.
  pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
    self.query.push((key.to_string(), value.to_string()));
    self
  }

  /// Attach a JSON body.
  pub fn with_json(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  /// Path plus a `k=v&k=v` rendering of the query, used to identify the request
  /// in interaction logs. Not URL-encoded.
  pub fn path_and_query(&self) -> String {
    if self.query.is_empty() {
      return self.path.clone();
    }
    let qs: Vec<String> = self.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", self.path, qs.join("&"))
  }
}

impl fmt::Display for ApiRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.method, self.path_and_query())
  }
}

/// Trait defining the basic connection interface to the gateway
#[cfg_attr(test, mockall::automock)]
pub trait Connection {
  /// Perform one request and return the decoded JSON body (`Null` when empty).
  fn execute(&self, request: &ApiRequest) -> Result<Value, IBKRError>;
}

/// Owns the connection and the optional interaction logger. Every manager
/// talks to the gateway through one shared broker.
pub struct MessageBroker {
  connection: Box<dyn Connection + Send + Sync>,
  logger: Option<ConnectionLogger>,
}

impl MessageBroker {
  pub fn new(connection: Box<dyn Connection + Send + Sync>, logger: Option<ConnectionLogger>) -> Self {
    MessageBroker { connection, logger }
  }

  pub fn request(&self, request: &ApiRequest) -> Result<Value, IBKRError> {
    debug!("Sending {}", request);
    if let Some(logger) = &self.logger {
      logger.log_request(request);
    }

    let result = self.connection.execute(request);
    match &result {
      Ok(body) => {
        trace!("Received for {}: {}", request, body);
        if let Some(logger) = &self.logger {
          logger.log_response(body);
        }
      }
      Err(e) => {
        warn!("Request {} failed: {}", request, e);
        if let Some(logger) = &self.logger {
          logger.log_failure(e);
        }
      }
    }
    result
  }
}

mod http {
  use log::{debug, info};
  use reqwest::blocking::Client;
  use serde_json::Value;
  use std::time::Duration;

  use super::{ApiRequest, Connection, HttpMethod};
  use crate::base::IBKRError;

  /// Blocking HTTPS connection to a running Client Portal gateway.
  pub struct HttpConnection {
    api_root: String,
    client: Client,
  }

  pub(crate) fn parse_body(text: &str) -> Result<Value, IBKRError> {
    if text.trim().is_empty() {
      return Ok(Value::Null);
    }
    serde_json::from_str(text)
      .map_err(|e| IBKRError::ParseError(format!("Response is not JSON ({}): {}", e, text)))
  }

  impl HttpConnection {
    /// `base_url` is the gateway origin, e.g. `https://localhost:5000`.
    /// The gateway ships a self-signed certificate, so `verify_ssl` is normally false.
    pub fn new(base_url: &str, verify_ssl: bool, timeout: Option<Duration>) -> Result<Self, IBKRError> {
      if base_url.trim().is_empty() {
        return Err(IBKRError::ConfigurationError("Gateway URL is empty".to_string()));
      }
      let api_root = format!("{}/v1/api/", base_url.trim_end_matches('/'));
      info!("Using Client Portal gateway at {} (verify_ssl={})", api_root, verify_ssl);

      let client = Client::builder()
        .danger_accept_invalid_certs(!verify_ssl)
        .timeout(timeout)
        .build()
        .map_err(|e| IBKRError::ConfigurationError(format!("Failed to build HTTP client: {}", e)))?;

      Ok(HttpConnection { api_root, client })
    }

    pub fn api_root(&self) -> &str { &self.api_root }
  }

  impl Connection for HttpConnection {
    fn execute(&self, request: &ApiRequest) -> Result<Value, IBKRError> {
      let url = format!("{}{}", self.api_root, request.path);
      let mut builder = match request.method {
        HttpMethod::Get => self.client.get(&url),
        HttpMethod::Post => self.client.post(&url),
        HttpMethod::Delete => self.client.delete(&url),
      };
      if !request.query.is_empty() {
        builder = builder.query(&request.query);
      }
      if let Some(body) = &request.body {
        builder = builder.json(body);
      }

      let response = builder.send()
        .map_err(|e| IBKRError::ConnectionFailed(format!("{} {}: {}", request.method, url, e)))?;
      let status = response.status();
      let text = response.text()
        .map_err(|e| IBKRError::ConnectionFailed(format!("Reading body of {} {}: {}", request.method, url, e)))?;
      debug!("{} {} -> {} ({} bytes)", request.method, url, status, text.len());

      if !status.is_success() {
        return Err(IBKRError::HttpError(status.as_u16(), text));
      }
      parse_body(&text)
    }
  }
}
