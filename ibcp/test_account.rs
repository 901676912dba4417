// ibcp/test_account.rs
use anyhow::{anyhow, Context, Result};
use log::info;
use ibcp::IBKRClient;

pub(super) fn accounts_impl(client: &IBKRClient, _is_live: bool) -> Result<()> {
  info!("--- Testing Account Listing ---");
  let accounts = client.account().list_accounts().context("Failed to list accounts")?;
  if accounts.is_empty() {
    return Err(anyhow!("Gateway lists no accounts"));
  }
  for acct in &accounts {
    info!("  {} ({}) type={:?} currency={:?}",
          acct.account_id, acct.display_name.as_deref().unwrap_or("-"),
          acct.account_type, acct.currency);
  }
  Ok(())
}

pub(super) fn portfolio_impl(client: &IBKRClient, _is_live: bool) -> Result<()> {
  info!("--- Testing Ledger and Portfolio ---");
  let acct_mgr = client.account();
  let ctx = acct_mgr.default_context().context("No default account")?;
  info!("Using account {}", ctx);

  let cash = acct_mgr.get_cash(&ctx)?;
  let net = acct_mgr.get_net_value(&ctx)?;
  info!("Cash: {:.2}, Net liquidation: {:.2}", cash, net);

  let positions = acct_mgr.list_positions(&ctx)?;
  if positions.is_empty() {
    info!("No open positions found.");
  }
  for pos in &positions {
    info!("  {} (conid {}): Qty {}, AvgCost {:?}, MktVal {:?}, UnPNL {:?}",
          pos.contract_desc, pos.conid, pos.position,
          pos.average_cost, pos.market_value, pos.unrealized_pnl);
  }

  let portfolio = acct_mgr.get_portfolio(&ctx)?;
  info!("Portfolio summary: {:?}", portfolio);
  Ok(())
}
