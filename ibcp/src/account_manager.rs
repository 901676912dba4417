// ibcp/src/account_manager.rs

//! Account listing and selection, ledger balances, and positions.
//!
//! There is no hidden "current account": [`AccountManager::default_context`]
//! and [`AccountManager::switch_account`] hand back an [`AccountContext`]
//! that the caller passes to every account-scoped operation.
//!
//! ```no_run
//! use ibcp::{IBKRClient, IBKRError};
//! use ibcp::client::ClientConfig;
//!
//! fn main() -> Result<(), IBKRError> {
//!     let client = IBKRClient::new(ClientConfig::default())?;
//!     let acct_mgr = client.account();
//!     let ctx = acct_mgr.default_context()?;
//!     println!("Cash: {}", acct_mgr.get_cash(&ctx)?);
//!     for (desc, qty) in acct_mgr.get_portfolio(&ctx)? {
//!         println!("  {}: {}", desc, qty);
//!     }
//!     Ok(())
//! }
//! ```

use crate::account::{Account, AccountContext, LedgerEntry, Position};
use crate::base::{decode, IBKRError};
use crate::conn::{ApiRequest, MessageBroker};

use log::{debug, info};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const BASE_CURRENCY_KEY: &str = "USD";

pub struct AccountManager {
  message_broker: Arc<MessageBroker>,
}

impl AccountManager {
  pub(crate) fn new(message_broker: Arc<MessageBroker>) -> Arc<Self> {
    Arc::new(AccountManager { message_broker })
  }

  /// Accounts visible to the logged-in user.
  pub fn list_accounts(&self) -> Result<Vec<Account>, IBKRError> {
    let body = self.message_broker.request(&ApiRequest::get("portfolio/accounts"))?;
    let accounts: Vec<Account> = decode(body, "account list")?;
    debug!("Gateway lists {} account(s)", accounts.len());
    Ok(accounts)
  }

  /// Context for the first listed account.
  pub fn default_context(&self) -> Result<AccountContext, IBKRError> {
    let accounts = self.list_accounts()?;
    let first = accounts.into_iter().next()
      .ok_or_else(|| IBKRError::InvalidAccount("Gateway returned no accounts".to_string()))?;
    info!("Selected default account {}", first.account_id);
    Ok(AccountContext::new(first.account_id))
  }

  /// Switch the gateway's active account and return a context for it, along
  /// with the gateway's answer.
  pub fn switch_account(&self, account_id: &str) -> Result<(AccountContext, Value), IBKRError> {
    if account_id.trim().is_empty() {
      return Err(IBKRError::InvalidAccount("Account id is empty".to_string()));
    }
    let request = ApiRequest::post("iserver/account").with_json(json!({ "acctId": account_id }));
    let body = self.message_broker.request(&request)?;
    info!("Switched to account {}", account_id);
    Ok((AccountContext::new(account_id), body))
  }

  /// Balances keyed by currency (plus the `BASE` summary entry).
  pub fn get_ledger(&self, ctx: &AccountContext) -> Result<HashMap<String, LedgerEntry>, IBKRError> {
    let body = self.message_broker.request(&ApiRequest::get(format!("portfolio/{}/ledger", ctx.account_id())))?;
    decode(body, "ledger")
  }

  fn usd_ledger(&self, ctx: &AccountContext) -> Result<LedgerEntry, IBKRError> {
    self.get_ledger(ctx)?
      .remove(BASE_CURRENCY_KEY)
      .ok_or_else(|| IBKRError::ParseError(format!("Ledger for {} has no {} entry", ctx, BASE_CURRENCY_KEY)))
  }

  /// USD cash balance.
  pub fn get_cash(&self, ctx: &AccountContext) -> Result<f64, IBKRError> {
    Ok(self.usd_ledger(ctx)?.cash_balance)
  }

  /// USD net liquidation value.
  pub fn get_net_value(&self, ctx: &AccountContext) -> Result<f64, IBKRError> {
    Ok(self.usd_ledger(ctx)?.net_liquidation_value)
  }

  /// First page of positions.
  pub fn list_positions(&self, ctx: &AccountContext) -> Result<Vec<Position>, IBKRError> {
    let body = self.message_broker.request(&ApiRequest::get(format!("portfolio/{}/positions/0", ctx.account_id())))?;
    if body.is_null() {
      return Ok(Vec::new());
    }
    decode(body, "positions")
  }

  /// Position size per contract description, plus `"USD"` mapped to the cash balance.
  pub fn get_portfolio(&self, ctx: &AccountContext) -> Result<HashMap<String, f64>, IBKRError> {
    let mut portfolio: HashMap<String, f64> = self.list_positions(ctx)?
      .into_iter()
      .map(|p| (p.contract_desc, p.position))
      .collect();
    portfolio.insert(BASE_CURRENCY_KEY.to_string(), self.get_cash(ctx)?);
    Ok(portfolio)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::conn::{HttpMethod, MockConnection};

  fn manager(conn: MockConnection) -> Arc<AccountManager> {
    AccountManager::new(Arc::new(MessageBroker::new(Box::new(conn), None)))
  }

  fn ledger_body() -> Value {
    json!({
      "USD": {"currency": "USD", "cashbalance": 1500.25, "netliquidationvalue": 10250.5},
      "BASE": {"currency": "BASE", "cashbalance": 1500.25, "netliquidationvalue": 10250.5}
    })
  }

  #[test]
  fn test_default_context_uses_first_account() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.method == HttpMethod::Get && req.path == "portfolio/accounts")
      .times(1)
      .returning(|_| Ok(json!([{"accountId": "DU1"}, {"accountId": "DU2"}])));
    let ctx = manager(conn).default_context().unwrap();
    assert_eq!(ctx.account_id(), "DU1");
  }

  #[test]
  fn test_default_context_no_accounts() {
    let mut conn = MockConnection::new();
    conn.expect_execute().times(1).returning(|_| Ok(json!([])));
    assert!(matches!(manager(conn).default_context(), Err(IBKRError::InvalidAccount(_))));
  }

  #[test]
  fn test_switch_account_returns_new_context() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.method == HttpMethod::Post && req.path == "iserver/account" && req.body == Some(json!({"acctId": "DU2"})))
      .times(1)
      .returning(|_| Ok(json!({"set": true, "acctId": "DU2"})));
    let (ctx, body) = manager(conn).switch_account("DU2").unwrap();
    assert_eq!(ctx, AccountContext::new("DU2"));
    assert_eq!(body["set"], json!(true));
  }

  #[test]
  fn test_switch_account_rejects_empty() {
    let mut conn = MockConnection::new();
    conn.expect_execute().never();
    assert!(matches!(manager(conn).switch_account(""), Err(IBKRError::InvalidAccount(_))));
  }

  #[test]
  fn test_cash_and_net_value() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "portfolio/DU1/ledger")
      .times(2)
      .returning(|_| Ok(ledger_body()));
    let mgr = manager(conn);
    let ctx = AccountContext::new("DU1");
    assert_eq!(mgr.get_cash(&ctx).unwrap(), 1500.25);
    assert_eq!(mgr.get_net_value(&ctx).unwrap(), 10250.5);
  }

  #[test]
  fn test_cash_missing_usd_entry() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .times(1)
      .returning(|_| Ok(json!({"EUR": {"cashbalance": 1.0, "netliquidationvalue": 2.0}})));
    assert!(matches!(manager(conn).get_cash(&AccountContext::new("DU1")), Err(IBKRError::ParseError(_))));
  }

  #[test]
  fn test_portfolio_combines_positions_and_cash() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "portfolio/DU1/positions/0")
      .times(1)
      .returning(|_| Ok(json!([
        {"conid": 265598, "contractDesc": "AAPL", "position": 7.0, "mktValue": 1200.0},
        {"conid": 76792991, "contractDesc": "TSLA", "position": -2.0}
      ])));
    conn.expect_execute()
      .withf(|req| req.path == "portfolio/DU1/ledger")
      .times(1)
      .returning(|_| Ok(ledger_body()));

    let portfolio = manager(conn).get_portfolio(&AccountContext::new("DU1")).unwrap();
    assert_eq!(portfolio.len(), 3);
    assert_eq!(portfolio["AAPL"], 7.0);
    assert_eq!(portfolio["TSLA"], -2.0);
    assert_eq!(portfolio["USD"], 1500.25);
  }

  #[test]
  fn test_positions_empty_body() {
    let mut conn = MockConnection::new();
    conn.expect_execute().times(1).returning(|_| Ok(Value::Null));
    assert!(manager(conn).list_positions(&AccountContext::new("DU1")).unwrap().is_empty());
  }
}
