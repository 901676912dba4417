// ibcp/src/account.rs
// Account data structures for the Client Portal API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The account an operation acts on.
///
/// Obtained from [`crate::account_manager::AccountManager::default_context`] or
/// [`crate::account_manager::AccountManager::switch_account`] and passed to
/// every account-scoped call. The client keeps no selection of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountContext {
  account_id: String,
}

impl AccountContext {
  pub fn new(account_id: impl Into<String>) -> Self {
    AccountContext { account_id: account_id.into() }
  }

  pub fn account_id(&self) -> &str {
    &self.account_id
  }
}

impl fmt::Display for AccountContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.account_id)
  }
}

/// One entry of `portfolio/accounts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  #[serde(rename = "accountId")]
  pub account_id: String,
  #[serde(rename = "displayName", default)]
  pub display_name: Option<String>,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(rename = "type", default)]
  pub account_type: Option<String>,
  #[serde(default)]
  pub desc: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Per-currency balances from `portfolio/{accountId}/ledger`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(rename = "cashbalance", default)]
  pub cash_balance: f64,
  #[serde(rename = "netliquidationvalue", default)]
  pub net_liquidation_value: f64,
  #[serde(rename = "settledcash", default)]
  pub settled_cash: Option<f64>,
  #[serde(rename = "stockmarketvalue", default)]
  pub stock_market_value: Option<f64>,
  #[serde(rename = "unrealizedpnl", default)]
  pub unrealized_pnl: Option<f64>,
  #[serde(rename = "realizedpnl", default)]
  pub realized_pnl: Option<f64>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// One position from `portfolio/{accountId}/positions/{page}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub conid: i64,
  #[serde(rename = "contractDesc", default)]
  pub contract_desc: String,
  #[serde(default)]
  pub position: f64,
  #[serde(rename = "mktPrice", default)]
  pub market_price: Option<f64>,
  #[serde(rename = "mktValue", default)]
  pub market_value: Option<f64>,
  #[serde(rename = "avgCost", default)]
  pub average_cost: Option<f64>,
  #[serde(rename = "unrealizedPnl", default)]
  pub unrealized_pnl: Option<f64>,
  #[serde(rename = "realizedPnl", default)]
  pub realized_pnl: Option<f64>,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(rename = "assetClass", default)]
  pub asset_class: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_account_keeps_unknown_fields() {
    let acct: Account = serde_json::from_value(json!({
      "accountId": "DU123456",
      "displayName": "DU123456",
      "currency": "USD",
      "type": "DEMO",
      "tradingType": "PMRGN"
    })).unwrap();
    assert_eq!(acct.account_id, "DU123456");
    assert_eq!(acct.account_type.as_deref(), Some("DEMO"));
    assert_eq!(acct.extra.get("tradingType"), Some(&json!("PMRGN")));
  }

  #[test]
  fn test_position_minimal() {
    let pos: Position = serde_json::from_value(json!({"conid": 265598, "contractDesc": "AAPL", "position": 7.0})).unwrap();
    assert_eq!(pos.contract_desc, "AAPL");
    assert_eq!(pos.position, 7.0);
    assert_eq!(pos.market_value, None);
  }

  #[test]
  fn test_context_display() {
    assert_eq!(AccountContext::new("U1").to_string(), "U1");
  }
}
