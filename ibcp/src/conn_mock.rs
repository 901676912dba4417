// ibcp/src/conn_mock.rs

use crate::base::IBKRError;
use crate::conn::{ApiRequest, Connection};
use crate::conn_log::{LogDirection, RecordedFailure};

use parking_lot::Mutex;
use rusqlite::{params, Connection as DbConnection};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

impl FromStr for LogDirection {
  type Err = IBKRError;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "SEND" => Ok(LogDirection::Send),
      "RECV" => Ok(LogDirection::Recv),
      "FAIL" => Ok(LogDirection::Fail),
      _ => Err(IBKRError::ParseError(format!("Invalid LogDirection string in log: {}", s))),
    }
  }
}

#[derive(Debug, Clone)]
struct LoggedMessage {
  direction: LogDirection,
  method: Option<String>,
  path: Option<String>,
  payload_text: String,
}

struct ReplayState {
  logged_messages: Vec<LoggedMessage>,
  message_iter_index: usize,
}

/// Serves a recorded session back, one exchange per `execute`.
///
/// Requests must arrive in the recorded order with the same method and
/// path (query included); bodies are not compared.
#[derive(Clone)]
pub struct ReplayConnection {
  inner: Arc<Mutex<ReplayState>>,
}

impl ReplayConnection {
  pub fn new<P: AsRef<Path>>(db_path: P, session_name: &str) -> Result<Self, IBKRError> {
    log::info!("Creating ReplayConnection for session '{}' from DB: {:?}",
               session_name, db_path.as_ref());

    let db = DbConnection::open(db_path)
      .map_err(|e| IBKRError::ConfigurationError(format!("Replay: Failed to open logger DB: {}", e)))?;

    let session_id: i64 = db.query_row(
      "SELECT session_id FROM sessions WHERE session_name = ?1",
      params![session_name],
      |row| row.get(0),
    ).map_err(|e| match e {
      rusqlite::Error::QueryReturnedNoRows => IBKRError::ConfigurationError(format!("Replay: Log session '{}' not found in database.", session_name)),
      _ => IBKRError::LoggingError(format!("Replay: Failed to query session '{}': {}", session_name, e)),
    })?;

    let logged_messages = {
      let mut stmt = db.prepare(
        "SELECT direction, method, path, payload_text
         FROM messages
         WHERE session_id = ?1
         ORDER BY message_id ASC"
      ).map_err(|e| IBKRError::LoggingError(format!("Replay: Failed to prepare message query: {}", e)))?;

      let messages_iter = stmt.query_map(params![session_id], |row| {
        let direction_str: String = row.get(0)?;
        let direction = LogDirection::from_str(&direction_str)
          .map_err(|_| rusqlite::Error::InvalidColumnType(0, "LogDirection".into(), rusqlite::types::Type::Text))?;
        Ok(LoggedMessage {
          direction,
          method: row.get(1)?,
          path: row.get(2)?,
          payload_text: row.get(3)?,
        })
      }).map_err(|e| IBKRError::LoggingError(format!("Replay: Failed to query messages for session {}: {}", session_id, e)))?;

      messages_iter.collect::<Result<Vec<_>, _>>()
        .map_err(|e| IBKRError::LoggingError(format!("Replay: Failed to map messages for session {}: {}", session_id, e)))?
    };

    log::info!("Replay: Loaded {} messages for session '{}'", logged_messages.len(), session_name);

    Ok(Self {
      inner: Arc::new(Mutex::new(ReplayState { logged_messages, message_iter_index: 0 })),
    })
  }

  /// Number of recorded messages not yet consumed.
  pub fn remaining(&self) -> usize {
    let guard = self.inner.lock();
    guard.logged_messages.len() - guard.message_iter_index
  }
}

impl Connection for ReplayConnection {
  fn execute(&self, request: &ApiRequest) -> Result<Value, IBKRError> {
    let mut guard = self.inner.lock();
    let index = guard.message_iter_index;

    let expected = guard.logged_messages.get(index).cloned().ok_or_else(|| {
      log::error!("Replay: {} requested, but no more logged messages expected.", request);
      IBKRError::ReplayError(format!("Unexpected request {}: end of logged messages reached", request))
    })?;

    if expected.direction != LogDirection::Send {
      return Err(IBKRError::ReplayError(format!(
        "Request {} at message #{}, but the log has {} there", request, index + 1, expected.direction)));
    }

    let method = request.method.to_string();
    let path = request.path_and_query();
    if expected.method.as_deref() != Some(method.as_str()) || expected.path.as_deref() != Some(path.as_str()) {
      log::error!("Replay: Mismatch at message #{}! Got {} {}, expected {} {}",
                  index + 1, method, path,
                  expected.method.as_deref().unwrap_or("?"), expected.path.as_deref().unwrap_or("?"));
      return Err(IBKRError::ReplayError(format!(
        "Request mismatch at message #{}: got {} {}, expected {} {}",
        index + 1, method, path,
        expected.method.unwrap_or_default(), expected.path.unwrap_or_default())));
    }

    let reply = guard.logged_messages.get(index + 1).cloned().ok_or_else(|| {
      IBKRError::ReplayError(format!("No logged response for {} (message #{})", request, index + 1))
    })?;
    guard.message_iter_index += 2;
    log::debug!("Replay: Matched {} at message #{}, answering with {}", request, index + 1, reply.direction);

    match reply.direction {
      LogDirection::Recv => serde_json::from_str(&reply.payload_text)
        .map_err(|e| IBKRError::ReplayError(format!("Logged response for {} is not JSON: {}", request, e))),
      LogDirection::Fail => {
        let failure: RecordedFailure = serde_json::from_str(&reply.payload_text)
          .unwrap_or(RecordedFailure { kind: "transport".to_string(), status: None, message: reply.payload_text.clone() });
        Err(failure.into_error())
      }
      LogDirection::Send => Err(IBKRError::ReplayError(format!(
        "Two consecutive SEND records at message #{}", index + 2))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::conn_log::ConnectionLogger;
  use serde_json::json;

  fn record(path: &Path) {
    let logger = ConnectionLogger::new(path, "replay", "https://localhost:5000").unwrap();
    logger.log_request(&ApiRequest::get("portfolio/accounts"));
    logger.log_response(&json!([{"accountId": "DU1"}]));
    logger.log_request(&ApiRequest::post("tickle"));
    logger.log_failure(&IBKRError::HttpError(401, "unauthorized".to_string()));
  }

  #[test]
  fn test_replay_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replay.db");
    record(&path);

    let conn = ReplayConnection::new(&path, "replay").unwrap();
    assert_eq!(conn.remaining(), 4);
    let body = conn.execute(&ApiRequest::get("portfolio/accounts")).unwrap();
    assert_eq!(body, json!([{"accountId": "DU1"}]));
    let err = conn.execute(&ApiRequest::post("tickle")).unwrap_err();
    assert!(matches!(err, IBKRError::HttpError(401, _)));
    assert_eq!(conn.remaining(), 0);
    assert!(matches!(conn.execute(&ApiRequest::post("tickle")), Err(IBKRError::ReplayError(_))));
  }

  #[test]
  fn test_replay_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replay.db");
    record(&path);

    let conn = ReplayConnection::new(&path, "replay").unwrap();
    let err = conn.execute(&ApiRequest::post("logout")).unwrap_err();
    assert!(matches!(err, IBKRError::ReplayError(_)));
  }

  #[test]
  fn test_replay_unknown_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replay.db");
    record(&path);
    assert!(matches!(ReplayConnection::new(&path, "nope"), Err(IBKRError::ConfigurationError(_))));
  }
}
