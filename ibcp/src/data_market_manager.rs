// ibcp/src/data_market_manager.rs

//! Historical market data.

use crate::base::{decode, IBKRError};
use crate::conn::{ApiRequest, MessageBroker};
use crate::data::{BarSize, HistoricalBars};
use crate::data_ref_manager::DataRefManager;

use log::debug;
use std::sync::Arc;

/// Default history window.
pub const DEFAULT_PERIOD: &str = "1w";

pub struct DataMarketManager {
  message_broker: Arc<MessageBroker>,
  data_ref_mgr: Arc<DataRefManager>,
}

impl DataMarketManager {
  pub(crate) fn new(message_broker: Arc<MessageBroker>, data_ref_mgr: Arc<DataRefManager>) -> Arc<Self> {
    Arc::new(DataMarketManager { message_broker, data_ref_mgr })
  }

  /// Bars for a contract id.
  ///
  /// `period` is `{1-30}min`, `{1-8}h`, `{1-1000}d`, `{1-792}w`, `{1-182}m` or `{1-15}y`.
  pub fn get_bars_by_conid(&self, conid: i64, period: &str, bar: BarSize, outside_rth: bool) -> Result<HistoricalBars, IBKRError> {
    if period.trim().is_empty() {
      return Err(IBKRError::InvalidParameter("History period is empty".to_string()));
    }
    let request = ApiRequest::get("iserver/marketdata/history")
      .with_query("conid", conid)
      .with_query("period", period)
      .with_query("bar", bar)
      .with_query("outsideRth", outside_rth);
    let bars: HistoricalBars = decode(self.message_broker.request(&request)?, "history")?;
    debug!("Received {} bars for conid {}", bars.data.len(), conid);
    Ok(bars)
  }

  /// Bars for a stock symbol; resolves the contract id first (one extra request).
  pub fn get_bars(&self, symbol: &str, period: &str, bar: BarSize, outside_rth: bool) -> Result<HistoricalBars, IBKRError> {
    let conid = self.data_ref_mgr.get_conid(symbol)?;
    self.get_bars_by_conid(conid, period, bar, outside_rth)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::conn::MockConnection;
  use mockall::Sequence;
  use serde_json::json;

  #[test]
  fn test_get_bars_resolves_conid_then_fetches() {
    let mut seq = Sequence::new();
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "trsrv/stocks")
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!({"TSLA": [{"contracts": [{"conid": 76792991}]}]})));
    conn.expect_execute()
      .withf(|req| {
        req.path == "iserver/marketdata/history"
          && req.path_and_query() == "iserver/marketdata/history?conid=76792991&period=1w&bar=1d&outsideRth=false"
      })
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!({"symbol": "TSLA", "data": [{"o": 1.0, "h": 2.0, "l": 0.5, "c": 1.5, "v": 10.0, "t": 1700000000000i64}]})));

    let broker = Arc::new(MessageBroker::new(Box::new(conn), None));
    let mgr = DataMarketManager::new(broker.clone(), DataRefManager::new(broker));
    let bars = mgr.get_bars("TSLA", DEFAULT_PERIOD, BarSize::Day1, false).unwrap();
    assert_eq!(bars.data.len(), 1);
    assert_eq!(bars.data[0].high, 2.0);
  }

  #[test]
  fn test_empty_period_rejected() {
    let mut conn = MockConnection::new();
    conn.expect_execute().never();
    let broker = Arc::new(MessageBroker::new(Box::new(conn), None));
    let mgr = DataMarketManager::new(broker.clone(), DataRefManager::new(broker));
    assert!(matches!(mgr.get_bars_by_conid(1, "", BarSize::Hour1, true), Err(IBKRError::InvalidParameter(_))));
  }
}
