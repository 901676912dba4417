// ibcp/test_order.rs
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::time::Duration;
use ibcp::{IBKRClient, OrderBuilder};
use ibcp::order::{OrderFilter, OrderReply, OrderSide, TimeInForce};

pub(super) fn live_orders_impl(client: &IBKRClient, _is_live: bool) -> Result<()> {
  info!("--- Testing Live Orders ---");
  let orders = client.orders()
    .list_live_orders(&[OrderFilter::Submitted, OrderFilter::PreSubmitted])
    .context("Failed to list live orders")?;
  info!("Live orders: {}", orders);
  Ok(())
}

pub(super) fn order_submit_impl(client: &IBKRClient, is_live: bool) -> Result<()> {
  info!("--- Testing Order Submit with Confirmations ---");
  if is_live {
    warn!("This test places a BUY LMT for 1 share of SPY at $1.00 and then cancels it.");
    std::thread::sleep(Duration::from_secs(3));
  }
  let ctx = client.account().default_context()?;
  let conid = client.data_ref().get_conid("SPY")?;

  let order = OrderBuilder::new(OrderSide::Buy, 1.0)
    .for_conid(conid)
    .limit(1.0)
    .with_tif(TimeInForce::Day)
    .with_generated_client_order_id()
    .build();
  debug!("Request: {:?}", order);

  let order_mgr = client.orders();
  let order_id = match order_mgr.submit_orders(&ctx, &[order], true).context("Submit failed")? {
    OrderReply::Placed(result) => {
      info!("Order placed with id {} (status {:?})", result.order_id(), result.order_status());
      result.order_id()
    }
    other => return Err(anyhow!("Gateway did not place the order: {:?}", other.raw())),
  };

  let status = order_mgr.get_order_status(&order_id)?;
  info!("Status of {}: {}", order_id, status);

  let cancelled = order_mgr.cancel_order(&ctx, &order_id).context("Cancel failed")?;
  info!("Cancel answer: {}", cancelled);
  Ok(())
}
