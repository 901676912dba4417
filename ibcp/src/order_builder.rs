// ibcp/src/order_builder.rs

use crate::order::{OrderRequest, OrderSide, OrderType, TimeInForce};
use serde_json::Value;

/// Build an order request.
///
/// The builder only fills in fields; it performs no validation. The gateway
/// rejects malformed orders in its response.
///
/// ```
/// use ibcp::OrderBuilder;
/// use ibcp::order::{OrderSide, TimeInForce};
///
/// let order = OrderBuilder::new(OrderSide::Buy, 7.0)
///     .for_conid(265598)
///     .limit(150.0)
///     .with_tif(TimeInForce::GoodTillCancelled)
///     .with_generated_client_order_id()
///     .build();
/// assert_eq!(order.conid, 265598);
/// assert!(order.client_order_id.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct OrderBuilder {
  order: OrderRequest,
}

impl OrderBuilder {
  /// Start building an order with the essential side and quantity.
  /// Defaults to a DAY market order.
  pub fn new(side: OrderSide, quantity: f64) -> Self {
    let order = OrderRequest {
      side,
      quantity,
      ..Default::default()
    };
    Self { order }
  }

  pub fn for_conid(mut self, conid: i64) -> Self {
    self.order.conid = conid;
    self
  }

  // --- Order types ---

  pub fn market(mut self) -> Self {
    self.order.order_type = OrderType::Market;
    self.order.price = None;
    self
  }

  pub fn limit(mut self, price: f64) -> Self {
    self.order.order_type = OrderType::Limit;
    self.order.price = Some(price);
    self
  }

  pub fn stop(mut self, stop_price: f64) -> Self {
    self.order.order_type = OrderType::Stop;
    self.order.price = Some(stop_price);
    self
  }

  pub fn stop_limit(mut self, limit_price: f64, stop_price: f64) -> Self {
    self.order.order_type = OrderType::StopLimit;
    self.order.price = Some(limit_price);
    self.order.aux_price = Some(stop_price);
    self
  }

  pub fn midprice(mut self, price_cap: Option<f64>) -> Self {
    self.order.order_type = OrderType::MidPrice;
    self.order.price = price_cap;
    self
  }

  /// Trailing stop; `percent` selects `%` instead of an absolute amount.
  pub fn trailing_stop(mut self, stop_price: f64, trailing_amount: f64, percent: bool) -> Self {
    self.order.order_type = OrderType::TrailingStop;
    self.order.price = Some(stop_price);
    self.order.trailing_amount = Some(trailing_amount);
    self.order.trailing_type = Some(if percent { "%" } else { "amt" }.to_string());
    self
  }

  // --- Attributes ---

  pub fn with_tif(mut self, tif: TimeInForce) -> Self {
    self.order.tif = tif;
    self
  }

  pub fn with_client_order_id(mut self, id: &str) -> Self {
    self.order.client_order_id = Some(id.to_string());
    self
  }

  /// Random `cOID`. The gateway refuses a second order carrying the same value.
  pub fn with_generated_client_order_id(mut self) -> Self {
    self.order.client_order_id = Some(uuid::Uuid::new_v4().to_string());
    self
  }

  pub fn with_parent_id(mut self, parent_id: &str) -> Self {
    self.order.parent_id = Some(parent_id.to_string());
    self
  }

  pub fn with_account(mut self, account_id: &str) -> Self {
    self.order.account_id = Some(account_id.to_string());
    self
  }

  pub fn with_sec_type(mut self, sec_type: &str) -> Self {
    self.order.sec_type = Some(sec_type.to_string());
    self
  }

  pub fn with_listing_exchange(mut self, exchange: &str) -> Self {
    self.order.listing_exchange = Some(exchange.to_string());
    self
  }

  pub fn with_ticker(mut self, ticker: &str) -> Self {
    self.order.ticker = Some(ticker.to_string());
    self
  }

  pub fn with_referrer(mut self, referrer: &str) -> Self {
    self.order.referrer = Some(referrer.to_string());
    self
  }

  pub fn outside_rth(mut self, enabled: bool) -> Self {
    self.order.outside_rth = Some(enabled);
    self
  }

  pub fn adaptive(mut self, enabled: bool) -> Self {
    self.order.use_adaptive = Some(enabled);
    self
  }

  /// Set any other gateway field by its wire name.
  pub fn with_field(mut self, key: &str, value: Value) -> Self {
    self.order.extra.insert(key.to_string(), value);
    self
  }

  pub fn build(self) -> OrderRequest {
    self.order
  }
}
