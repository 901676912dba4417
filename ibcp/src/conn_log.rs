// ibcp/src/conn_log.rs

use crate::base::IBKRError;
use crate::conn::ApiRequest;

use rusqlite::{params, Connection as DbConnection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDirection {
  Send,
  Recv,
  Fail,
}

impl fmt::Display for LogDirection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LogDirection::Send => write!(f, "SEND"),
      LogDirection::Recv => write!(f, "RECV"),
      LogDirection::Fail => write!(f, "FAIL"),
    }
  }
}

/// Payload stored for a FAIL record, enough to rebuild the error on replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct RecordedFailure {
  pub kind: String,
  pub status: Option<u16>,
  pub message: String,
}

impl RecordedFailure {
  pub(crate) fn from_error(err: &IBKRError) -> Self {
    match err {
      IBKRError::HttpError(status, body) => RecordedFailure {
        kind: "http".to_string(),
        status: Some(*status),
        message: body.clone(),
      },
      other => RecordedFailure {
        kind: "transport".to_string(),
        status: None,
        message: other.to_string(),
      },
    }
  }

  pub(crate) fn into_error(self) -> IBKRError {
    match (self.kind.as_str(), self.status) {
      ("http", Some(status)) => IBKRError::HttpError(status, self.message),
      _ => IBKRError::ConnectionFailed(self.message),
    }
  }
}

// The logger state needs to be behind a Mutex for thread safety
struct ConnectionLoggerInner {
  db: DbConnection,
  session_id: i64,
  start_time_instant: Instant,
}

/// Records every request/response exchange of a session into SQLite so it can
/// be replayed later with [`crate::conn_mock::ReplayConnection`].
#[derive(Clone)] // Clone shares the Arc, pointing to the same Mutex-protected inner state
pub struct ConnectionLogger {
  inner: Arc<Mutex<ConnectionLoggerInner>>,
}

impl ConnectionLogger {
  /// Creates a new logger, initializing the database schema, deleting any previous
  /// session with the same name, and starting a new session record.
  pub fn new<P: AsRef<Path>>(
    db_path: P,
    session_name: &str,
    base_url: &str,
  ) -> Result<Self, IBKRError> {
    log::info!(
      "Initializing connection logger at path: {:?}, Session Name: '{}'",
      db_path.as_ref(), session_name
    );
    let mut db = DbConnection::open(db_path)
      .map_err(|e| IBKRError::ConfigurationError(format!("Failed to open logger database: {}", e)))?;

    db.pragma_update(None, "journal_mode", "WAL")
      .map_err(|e| IBKRError::ConfigurationError(format!("Failed to set WAL mode: {}", e)))?;
    db.execute("PRAGMA foreign_keys = ON;", [])
      .map_err(|e| IBKRError::ConfigurationError(format!("Failed to enable foreign keys: {}", e)))?;

    Self::create_tables(&db)?;

    let start_time_instant = Instant::now();
    let start_time_unix_ms = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map_err(|e| IBKRError::InternalError(format!("System time error: {}", e)))?
      .as_millis() as i64;

    let session_id = Self::delete_and_insert_session(&mut db, session_name, start_time_unix_ms, base_url)?;
    log::info!("Started logger session ID: {} for name '{}'", session_id, session_name);

    Ok(Self {
      inner: Arc::new(Mutex::new(ConnectionLoggerInner { db, session_id, start_time_instant })),
    })
  }

  fn create_tables(db: &DbConnection) -> Result<(), IBKRError> {
    db.execute_batch(
      "BEGIN;
             CREATE TABLE IF NOT EXISTS sessions (
                 session_id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 session_name        TEXT NOT NULL UNIQUE,
                 start_time_unix_ms  INTEGER NOT NULL,
                 base_url            TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS messages (
                 message_id            INTEGER PRIMARY KEY AUTOINCREMENT,
                 session_id            INTEGER NOT NULL,
                 direction             TEXT NOT NULL CHECK(direction IN ('SEND', 'RECV', 'FAIL')),
                 relative_timestamp_ms REAL NOT NULL,
                 method                TEXT NULL,
                 path                  TEXT NULL,
                 payload_text          TEXT NOT NULL,
                 FOREIGN KEY (session_id) REFERENCES sessions(session_id) ON DELETE CASCADE
             );
             CREATE INDEX IF NOT EXISTS idx_sessions_name ON sessions (session_name);
             CREATE INDEX IF NOT EXISTS idx_messages_session_order ON messages (session_id, message_id);
             COMMIT;"
    ).map_err(|e| IBKRError::ConfigurationError(format!("Failed to create logger tables: {}", e)))?;
    Ok(())
  }

  fn delete_and_insert_session(
    db: &mut DbConnection,
    session_name: &str,
    start_time_unix_ms: i64,
    base_url: &str,
  ) -> Result<i64, IBKRError> {
    let tx = db.transaction()
      .map_err(|e| IBKRError::LoggingError(format!("Failed to start logger transaction: {}", e)))?;

    // ON DELETE CASCADE removes the old messages.
    let deleted_count = tx.execute("DELETE FROM sessions WHERE session_name = ?1", params![session_name])
      .map_err(|e| IBKRError::LoggingError(format!("Failed to delete previous session '{}': {}", session_name, e)))?;
    if deleted_count > 0 {
      log::warn!("Deleted {} previous log session(s) named '{}'", deleted_count, session_name);
    }

    tx.execute(
      "INSERT INTO sessions (session_name, start_time_unix_ms, base_url) VALUES (?1, ?2, ?3)",
      params![session_name, start_time_unix_ms, base_url],
    ).map_err(|e| IBKRError::LoggingError(format!("Failed to insert new session '{}': {}", session_name, e)))?;

    let new_session_id = tx.last_insert_rowid();
    tx.commit()
      .map_err(|e| IBKRError::LoggingError(format!("Failed to commit logger transaction: {}", e)))?;
    Ok(new_session_id)
  }

  /// Logs an outgoing request. The payload is the JSON body, or empty.
  pub fn log_request(&self, request: &ApiRequest) {
    let payload = request.body.as_ref().map(|b| b.to_string()).unwrap_or_default();
    let method = request.method.to_string();
    self.log_message(LogDirection::Send, Some(&method), Some(&request.path_and_query()), &payload);
  }

  /// Logs the decoded body of a successful response.
  pub fn log_response(&self, body: &Value) {
    self.log_message(LogDirection::Recv, None, None, &body.to_string());
  }

  /// Logs a failed exchange.
  pub fn log_failure(&self, err: &IBKRError) {
    let payload = serde_json::to_string(&RecordedFailure::from_error(err))
      .unwrap_or_else(|_| err.to_string());
    self.log_message(LogDirection::Fail, None, None, &payload);
  }

  fn log_message(&self, direction: LogDirection, method: Option<&str>, path: Option<&str>, payload_text: &str) {
    match self.inner.lock() {
      Ok(guard) => {
        let relative_timestamp_ms = guard.start_time_instant.elapsed().as_secs_f64() * 1000.0;
        match guard.db.execute(
          "INSERT INTO messages (session_id, direction, relative_timestamp_ms, method, path, payload_text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            guard.session_id,
            direction.to_string(),
            relative_timestamp_ms,
            method,
            path,
            payload_text
          ],
        ) {
          Ok(_) => {
            log::trace!(
              "Logged {} message: {} {}, RelTime={:.3}ms, Size={}",
              direction,
              method.unwrap_or("-"),
              path.unwrap_or("-"),
              relative_timestamp_ms,
              payload_text.len()
            );
          }
          Err(e) => {
            log::error!("Failed to log message to database: {}", e);
          }
        }
      }
      Err(poisoned) => {
        log::error!("ConnectionLogger mutex poisoned: {}", poisoned);
      }
    }
  }
}
