// ibcp/src/base.rs
// Base types and error definitions for the Client Portal API

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;


/// Errors that can occur in the Client Portal API
#[derive(Error, Debug, Clone)]
pub enum IBKRError {
  #[error("Configuration error: {0}")]
  ConfigurationError(String),

  #[error("Connection failed: {0}")]
  ConnectionFailed(String),

  #[error("HTTP error: status={0}, body={1}")]
  HttpError(u16, String),

  #[error("Message parse error: {0}")]
  ParseError(String),

  #[error("Invalid parameter: {0}")]
  InvalidParameter(String),

  #[error("Logging error: {0}")]
  LoggingError(String),

  #[error("Replay error: {0}")]
  ReplayError(String),

  #[error("Confirmation limit exceeded: vendor still asking after {0} replies")]
  ConfirmationLimitExceeded(usize),

  #[error("Internal error: {0}")]
  InternalError(String),

  #[error("Invalid contract: {0}")]
  InvalidContract(String),

  #[error("Invalid account: {0}")]
  InvalidAccount(String),
}

/// Picks the element the gateway actually answered with.
///
/// Order and reply endpoints return a JSON array whose first entry is the
/// interesting one. Some error paths return a bare object instead, which is
/// taken as-is.
pub(crate) fn first_element(body: Value) -> Result<Map<String, Value>, IBKRError> {
  match body {
    Value::Array(items) => match items.into_iter().next() {
      Some(Value::Object(map)) => Ok(map),
      Some(other) => Err(IBKRError::ParseError(format!("Expected object as first response element, got: {}", other))),
      None => Err(IBKRError::ParseError("Empty response array".to_string())),
    },
    Value::Object(map) => Ok(map),
    other => Err(IBKRError::ParseError(format!("Expected array or object response, got: {}", other))),
  }
}

/// Deserializes a response body; `what` names the endpoint in the error.
pub(crate) fn decode<T: DeserializeOwned>(body: Value, what: &str) -> Result<T, IBKRError> {
  serde_json::from_value(body)
    .map_err(|e| IBKRError::ParseError(format!("Unexpected {} response: {}", what, e)))
}
