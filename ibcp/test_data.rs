// ibcp/test_data.rs
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use ibcp::IBKRClient;
use ibcp::data::BarSize;
use ibcp::data_market_manager::DEFAULT_PERIOD;

pub(super) fn conid_lookup_impl(client: &IBKRClient, _is_live: bool) -> Result<()> {
  info!("--- Testing Contract Id Lookup ---");
  let conid = client.data_ref().get_conid("AAPL").context("AAPL lookup failed")?;
  info!("AAPL -> conid {}", conid);
  if conid != 265598 {
    warn!("AAPL conid is usually 265598, got {}", conid);
  }
  Ok(())
}

pub(super) fn history_bars_impl(client: &IBKRClient, _is_live: bool) -> Result<()> {
  info!("--- Testing Historical Bars ---");
  let bars = client.data_market()
    .get_bars("SPY", DEFAULT_PERIOD, BarSize::Day1, false)
    .context("Failed to fetch SPY bars")?;
  if bars.data.is_empty() {
    return Err(anyhow!("No bars returned for SPY"));
  }
  for bar in &bars.data {
    info!("  {:?}: O {:.2} H {:.2} L {:.2} C {:.2} V {:.0}",
          bar.time(), bar.open, bar.high, bar.low, bar.close, bar.volume);
  }
  Ok(())
}
