// ibcp/src/data_ref_manager.rs

//! Contract reference data: symbol to contract id lookup.

use crate::base::IBKRError;
use crate::conn::{ApiRequest, MessageBroker};

use log::debug;
use serde_json::Value;
use std::sync::Arc;

pub struct DataRefManager {
  message_broker: Arc<MessageBroker>,
}

impl DataRefManager {
  pub(crate) fn new(message_broker: Arc<MessageBroker>) -> Arc<Self> {
    Arc::new(DataRefManager { message_broker })
  }

  /// Raw `trsrv/stocks` answer for one or more comma-separated symbols.
  pub fn search_stocks(&self, symbols: &str) -> Result<Value, IBKRError> {
    if symbols.trim().is_empty() {
      return Err(IBKRError::InvalidParameter("Symbol is empty".to_string()));
    }
    self.message_broker.request(&ApiRequest::get("trsrv/stocks").with_query("symbols", symbols))
  }

  /// Contract id of the first contract listed for `symbol`.
  pub fn get_conid(&self, symbol: &str) -> Result<i64, IBKRError> {
    let body = self.search_stocks(symbol)?;
    let conid = body.get(symbol)
      .and_then(|entries| entries.get(0))
      .and_then(|entry| entry.get("contracts"))
      .and_then(|contracts| contracts.get(0))
      .and_then(|contract| contract.get("conid"))
      .and_then(Value::as_i64)
      .ok_or_else(|| IBKRError::InvalidContract(format!("No contract found for symbol '{}'", symbol)))?;
    debug!("Resolved {} to conid {}", symbol, conid);
    Ok(conid)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::conn::MockConnection;
  use serde_json::json;

  fn manager(conn: MockConnection) -> Arc<DataRefManager> {
    DataRefManager::new(Arc::new(MessageBroker::new(Box::new(conn), None)))
  }

  #[test]
  fn test_get_conid() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "trsrv/stocks" && req.query == vec![("symbols".to_string(), "AAPL".to_string())])
      .times(1)
      .returning(|_| Ok(json!({
        "AAPL": [{
          "name": "APPLE INC",
          "assetClass": "STK",
          "contracts": [{"conid": 265598, "exchange": "NASDAQ", "isUS": true}]
        }]
      })));
    assert_eq!(manager(conn).get_conid("AAPL").unwrap(), 265598);
  }

  #[test]
  fn test_get_conid_unknown_symbol() {
    let mut conn = MockConnection::new();
    conn.expect_execute().times(1).returning(|_| Ok(json!({})));
    assert!(matches!(manager(conn).get_conid("NOPE"), Err(IBKRError::InvalidContract(_))));
  }

  #[test]
  fn test_empty_symbol_rejected() {
    let mut conn = MockConnection::new();
    conn.expect_execute().never();
    assert!(matches!(manager(conn).get_conid(" "), Err(IBKRError::InvalidParameter(_))));
  }
}
