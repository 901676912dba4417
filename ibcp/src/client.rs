// ibcp/src/client.rs

use crate::order_manager::{OrderManager, DEFAULT_MAX_CONFIRMATIONS};
use crate::account_manager::AccountManager;
use crate::data_ref_manager::DataRefManager;
use crate::data_market_manager::DataMarketManager;
use crate::conn::{Connection, HttpConnection, MessageBroker};
use crate::conn_log::ConnectionLogger;
use crate::conn_mock::ReplayConnection;
use crate::base::IBKRError;
use log::info;
use std::env;
use std::sync::Arc;
use std::time::Duration;
pub use mgr::ClientManager;

pub const DEFAULT_GATEWAY_URL: &str = "https://localhost:5000";

/// Client settings. `Default` targets a gateway on the local machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
  /// Gateway origin; `/v1/api/` is appended.
  pub base_url: String,
  pub verify_ssl: bool,
  pub request_timeout: Option<Duration>,
  /// Upper bound on automatically answered confirmation prompts per order call.
  pub max_confirmations: usize,
  /// `(db_path, session_name)` to record every exchange into SQLite.
  pub log_config: Option<(String, String)>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    ClientConfig {
      base_url: DEFAULT_GATEWAY_URL.to_string(),
      verify_ssl: false,
      request_timeout: Some(Duration::from_secs(30)),
      max_confirmations: DEFAULT_MAX_CONFIRMATIONS,
      log_config: None,
    }
  }
}

impl ClientConfig {
  /// Defaults overlaid with `IBCP_GATEWAY_URL`, `IBCP_VERIFY_SSL` and `IBCP_MAX_CONFIRMATIONS`.
  pub fn from_env() -> Result<Self, IBKRError> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, IBKRError> {
    let mut config = ClientConfig::default();
    if let Some(url) = lookup("IBCP_GATEWAY_URL") {
      config.base_url = url;
    }
    if let Some(verify) = lookup("IBCP_VERIFY_SSL") {
      config.verify_ssl = match verify.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" | "" => false,
        other => return Err(IBKRError::ConfigurationError(format!("IBCP_VERIFY_SSL: not a boolean: '{}'", other))),
      };
    }
    if let Some(max) = lookup("IBCP_MAX_CONFIRMATIONS") {
      config.max_confirmations = max.trim().parse()
        .map_err(|e| IBKRError::ConfigurationError(format!("IBCP_MAX_CONFIRMATIONS '{}': {}", max, e)))?;
    }
    Ok(config)
  }
}

pub struct IBKRClient {
  client_mgr: Arc<ClientManager>,
  order_mgr: Arc<OrderManager>,
  account_mgr: Arc<AccountManager>,
  data_ref_mgr: Arc<DataRefManager>,
  data_market_mgr: Arc<DataMarketManager>,
}

impl IBKRClient {
  /// Connect to a live gateway.
  pub fn new(config: ClientConfig) -> Result<Self, IBKRError> {
    let logger = if let Some((db_path, session_name)) = &config.log_config {
      Some(ConnectionLogger::new(db_path, session_name, &config.base_url)?)
    } else { None };
    let conn = Box::new(HttpConnection::new(&config.base_url, config.verify_ssl, config.request_timeout)?);
    Ok(Self::with_connection(conn, logger, &config))
  }

  /// Create a new client using a stored interaction.
  ///
  /// Pass the config the session was recorded with: `max_confirmations` decides
  /// how many replies are sent, and replay expects exactly the recorded ones.
  pub fn from_db(db_path: &str, session_name: &str, config: &ClientConfig) -> Result<IBKRClient, IBKRError> {
    let conn = Box::new(ReplayConnection::new(db_path, session_name)?);
    Ok(Self::with_connection(conn, None, config))
  }

  /// Build a client over any connection. Only `max_confirmations` is read from `config`.
  pub fn with_connection(
    conn: Box<dyn Connection + Send + Sync>,
    logger: Option<ConnectionLogger>,
    config: &ClientConfig,
  ) -> IBKRClient {
    let message_broker = Arc::new(MessageBroker::new(conn, logger));
    let client_mgr = ClientManager::new(message_broker.clone());
    let order_mgr = OrderManager::new(message_broker.clone(), config.max_confirmations);
    let account_mgr = AccountManager::new(message_broker.clone());
    let data_ref_mgr = DataRefManager::new(message_broker.clone());
    let data_market_mgr = DataMarketManager::new(message_broker, data_ref_mgr.clone());
    info!("Client ready (max_confirmations={})", config.max_confirmations);
    IBKRClient {
      client_mgr,
      order_mgr,
      account_mgr,
      data_ref_mgr,
      data_market_mgr,
    }
  }

  pub fn client(&self) -> Arc<ClientManager> {
    self.client_mgr.clone()
  }

  pub fn orders(&self) -> Arc<OrderManager> {
    self.order_mgr.clone()
  }

  pub fn account(&self) -> Arc<AccountManager> {
    self.account_mgr.clone()
  }

  pub fn data_ref(&self) -> Arc<DataRefManager> {
    self.data_ref_mgr.clone()
  }

  pub fn data_market(&self) -> Arc<DataMarketManager> {
    self.data_market_mgr.clone()
  }
}

mod mgr {
  use crate::base::IBKRError;
  use crate::conn::{ApiRequest, MessageBroker};
  use log::{info, warn};
  use serde_json::Value;
  use std::sync::Arc;

  /// Gateway session: keep-alive, authentication state, logout.
  pub struct ClientManager {
    message_broker: Arc<MessageBroker>,
  }

  impl ClientManager {
    pub(crate) fn new(message_broker: Arc<MessageBroker>) -> Arc<Self> {
      Arc::new(ClientManager { message_broker })
    }

    /// Keep-alive. The gateway drops idle sessions after a few minutes.
    pub fn ping_server(&self) -> Result<Value, IBKRError> {
      self.message_broker.request(&ApiRequest::post("tickle"))
    }

    pub fn auth_status(&self) -> Result<Value, IBKRError> {
      let body = self.message_broker.request(&ApiRequest::post("iserver/auth/status"))?;
      if body.get("authenticated").and_then(Value::as_bool) == Some(false) {
        warn!("Gateway session is not authenticated");
      }
      Ok(body)
    }

    /// Convenience over [`ClientManager::auth_status`].
    pub fn is_authenticated(&self) -> Result<bool, IBKRError> {
      Ok(self.auth_status()?.get("authenticated").and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn reauthenticate(&self) -> Result<Value, IBKRError> {
      info!("Requesting re-authentication");
      self.message_broker.request(&ApiRequest::post("iserver/reauthenticate"))
    }

    pub fn logout(&self) -> Result<Value, IBKRError> {
      info!("Logging out of gateway session");
      self.message_broker.request(&ApiRequest::post("logout"))
    }
  }
}
