// ibcp/src/order_manager.rs

//! Order placement, modification and the confirmation handshake.
//!
//! The gateway often answers an order submission with a *confirmation
//! message* (a risk warning, a price cap notice, ...) instead of an order id.
//! Each such message has to be acknowledged through `iserver/reply/{id}`,
//! and the reply may itself return another message. [`OrderManager`] walks
//! that chain when `auto_confirm` is set, up to a configured number of
//! replies.
//!
//! ```no_run
//! use ibcp::{IBKRClient, IBKRError, OrderBuilder};
//! use ibcp::client::ClientConfig;
//! use ibcp::order::{OrderReply, OrderSide, TimeInForce};
//!
//! fn main() -> Result<(), IBKRError> {
//!     let client = IBKRClient::new(ClientConfig::default())?;
//!     let ctx = client.account().default_context()?;
//!     let order = OrderBuilder::new(OrderSide::Buy, 7.0)
//!         .for_conid(265598)
//!         .with_tif(TimeInForce::GoodTillCancelled)
//!         .build();
//!     match client.orders().submit_orders(&ctx, &[order], true)? {
//!         OrderReply::Placed(result) => println!("Placed order {}", result.order_id()),
//!         other => println!("Gateway answered: {:?}", other.raw()),
//!     }
//!     Ok(())
//! }
//! ```

use crate::account::AccountContext;
use crate::base::{first_element, IBKRError};
use crate::conn::{ApiRequest, MessageBroker};
use crate::order::{OrderFilter, OrderReply, OrderRequest};

use log::{debug, info, warn};
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_MAX_CONFIRMATIONS: usize = 16;

pub struct OrderManager {
  message_broker: Arc<MessageBroker>,
  max_confirmations: usize,
}

impl OrderManager {
  pub(crate) fn new(message_broker: Arc<MessageBroker>, max_confirmations: usize) -> Arc<Self> {
    Arc::new(OrderManager { message_broker, max_confirmations })
  }

  /// Upper bound on confirmation replies sent for a single submission.
  pub fn max_confirmations(&self) -> usize {
    self.max_confirmations
  }

  /// Submit one or more orders for the account in `ctx`.
  ///
  /// With `auto_confirm`, every confirmation message is answered "yes" until the
  /// gateway returns an order id. Without it, the first response element is
  /// returned as-is and the caller answers prompts with [`Self::reply_yes`].
  ///
  /// # Errors
  /// * `InvalidParameter` if `orders` is empty (no request is sent).
  /// * `ConfirmationLimitExceeded` if the gateway keeps asking after
  ///   `max_confirmations` replies.
  /// * Any transport error, unchanged. The order may or may not have been placed.
  pub fn submit_orders(&self, ctx: &AccountContext, orders: &[OrderRequest], auto_confirm: bool) -> Result<OrderReply, IBKRError> {
    if orders.is_empty() {
      return Err(IBKRError::InvalidParameter("At least one order is required".to_string()));
    }
    let orders_json = serde_json::to_value(orders)
      .map_err(|e| IBKRError::InternalError(format!("Failed to encode orders: {}", e)))?;

    info!("Submitting {} order(s) for account {}", orders.len(), ctx);
    let request = ApiRequest::post(format!("iserver/account/{}/orders", ctx.account_id()))
      .with_json(json!({ "orders": orders_json }));
    let first = first_element(self.message_broker.request(&request)?)?;
    self.resolve_confirmations(OrderReply::from_map(first), auto_confirm)
  }

  /// Answer "yes" to a single confirmation message.
  ///
  /// Returns the first element of the gateway's answer: either the next
  /// confirmation message or the terminal order result.
  pub fn reply_yes(&self, confirmation_id: &str) -> Result<OrderReply, IBKRError> {
    if confirmation_id.trim().is_empty() {
      return Err(IBKRError::InvalidParameter("Confirmation id is missing".to_string()));
    }
    let request = ApiRequest::post(format!("iserver/reply/{}", confirmation_id))
      .with_json(json!({ "confirmed": true }));
    let first = first_element(self.message_broker.request(&request)?)?;
    Ok(OrderReply::from_map(first))
  }

  /// Modify a working order. Same confirmation semantics as [`Self::submit_orders`].
  ///
  /// A blank `order_id` is rejected with `InvalidParameter` before anything is sent.
  pub fn modify_order(&self, ctx: &AccountContext, order_id: &str, order: &OrderRequest, auto_confirm: bool) -> Result<OrderReply, IBKRError> {
    if order_id.trim().is_empty() {
      return Err(IBKRError::InvalidParameter("Input parameter order_id is missing".to_string()));
    }
    let order_json = serde_json::to_value(order)
      .map_err(|e| IBKRError::InternalError(format!("Failed to encode order: {}", e)))?;

    info!("Modifying order {} for account {}", order_id, ctx);
    let request = ApiRequest::post(format!("iserver/account/{}/order/{}", ctx.account_id(), order_id))
      .with_json(order_json);
    let first = first_element(self.message_broker.request(&request)?)?;
    self.resolve_confirmations(OrderReply::from_map(first), auto_confirm)
  }

  /// Status details for one order.
  pub fn get_order_status(&self, order_id: &str) -> Result<Value, IBKRError> {
    if order_id.trim().is_empty() {
      return Err(IBKRError::InvalidParameter("Order id is missing".to_string()));
    }
    self.message_broker.request(&ApiRequest::get(format!("iserver/account/order/status/{}", order_id)))
  }

  /// Live orders of the session, optionally filtered.
  pub fn list_live_orders(&self, filters: &[OrderFilter]) -> Result<Value, IBKRError> {
    let request = filters.iter().fold(ApiRequest::get("iserver/account/orders"), |req, f| {
      req.with_query("filters", f)
    });
    self.message_broker.request(&request)
  }

  pub fn cancel_order(&self, ctx: &AccountContext, order_id: &str) -> Result<Value, IBKRError> {
    if order_id.trim().is_empty() {
      return Err(IBKRError::InvalidParameter("Order id is missing".to_string()));
    }
    info!("Cancelling order {} for account {}", order_id, ctx);
    self.message_broker.request(&ApiRequest::delete(format!("iserver/account/{}/order/{}", ctx.account_id(), order_id)))
  }

  fn resolve_confirmations(&self, mut reply: OrderReply, auto_confirm: bool) -> Result<OrderReply, IBKRError> {
    if !auto_confirm {
      return Ok(reply);
    }
    let mut replies_sent = 0usize;
    loop {
      let confirmation = match &reply {
        OrderReply::Confirmation(c) => c,
        OrderReply::Placed(result) => {
          debug!("Order {} acknowledged after {} confirmation(s)", result.order_id(), replies_sent);
          break;
        }
        OrderReply::Unrecognized(body) => {
          warn!("Order response has neither order_id nor id: {}", Value::Object(body.clone()));
          break;
        }
      };
      if replies_sent >= self.max_confirmations {
        warn!("Giving up after {} confirmation replies; last prompt: {}", replies_sent, confirmation.prompt());
        return Err(IBKRError::ConfirmationLimitExceeded(replies_sent));
      }
      info!("Answering yes to: {}", confirmation.prompt());
      let id = confirmation.id.clone();
      reply = self.reply_yes(&id)?;
      replies_sent += 1;
    }
    Ok(reply)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::conn::{HttpMethod, MockConnection};
  use crate::order::{OrderSide, OrderType, TimeInForce};
  use mockall::Sequence;

  fn sample_order() -> OrderRequest {
    OrderRequest {
      conid: 265598,
      order_type: OrderType::Market,
      side: OrderSide::Buy,
      quantity: 7.0,
      tif: TimeInForce::GoodTillCancelled,
      ..Default::default()
    }
  }

  fn manager(conn: MockConnection, max_confirmations: usize) -> Arc<OrderManager> {
    OrderManager::new(Arc::new(MessageBroker::new(Box::new(conn), None)), max_confirmations)
  }

  fn ctx() -> AccountContext {
    AccountContext::new("DU123")
  }

  #[test]
  fn test_submit_terminal_first_response_single_call() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.method == HttpMethod::Post && req.path == "iserver/account/DU123/orders")
      .times(1)
      .returning(|_| Ok(json!([{"order_id": "42", "order_status": "PreSubmitted"}])));

    let reply = manager(conn, 16).submit_orders(&ctx(), &[sample_order()], true).unwrap();
    assert_eq!(reply.order_id().as_deref(), Some("42"));
    assert_eq!(reply.raw().get("order_status"), Some(&json!("PreSubmitted")));
  }

  #[test]
  fn test_submit_sends_orders_body() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| {
        req.body == Some(json!({"orders": [{"conid": 265598, "orderType": "MKT", "side": "BUY", "quantity": 7.0, "tif": "GTC"}]}))
      })
      .times(1)
      .returning(|_| Ok(json!([{"order_id": "1"}])));
    manager(conn, 16).submit_orders(&ctx(), &[sample_order()], true).unwrap();
  }

  #[test]
  fn test_submit_resolves_single_confirmation() {
    let mut seq = Sequence::new();
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "iserver/account/DU123/orders")
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!([{"id": "m1", "message": ["Risk warning"]}])));
    conn.expect_execute()
      .withf(|req| req.path == "iserver/reply/m1" && req.body == Some(json!({"confirmed": true})))
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!([{"order_id": "998877"}])));

    let reply = manager(conn, 16).submit_orders(&ctx(), &[sample_order()], true).unwrap();
    assert_eq!(reply.raw(), json!({"order_id": "998877"}).as_object().unwrap());
  }

  #[test]
  fn test_submit_resolves_chain_of_n_confirmations() {
    const N: usize = 3;
    let mut seq = Sequence::new();
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "iserver/account/DU123/orders")
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!([{"id": "m0", "message": ["prompt 0"]}])));
    for i in 0..N {
      let expected_path = format!("iserver/reply/m{}", i);
      let next = if i + 1 < N {
        json!([{"id": format!("m{}", i + 1), "message": [format!("prompt {}", i + 1)]}])
      } else {
        json!([{"order_id": "777"}])
      };
      conn.expect_execute()
        .withf(move |req| req.path == expected_path)
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(next.clone()));
    }

    let reply = manager(conn, 16).submit_orders(&ctx(), &[sample_order()], true).unwrap();
    assert_eq!(reply.order_id().as_deref(), Some("777"));
  }

  #[test]
  fn test_submit_without_auto_confirm_never_replies() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "iserver/account/DU123/orders")
      .times(1)
      .returning(|_| Ok(json!([{"id": "m1", "message": ["Risk warning"]}])));
    conn.expect_execute()
      .withf(|req| req.path.starts_with("iserver/reply/"))
      .never();

    let reply = manager(conn, 16).submit_orders(&ctx(), &[sample_order()], false).unwrap();
    match reply {
      OrderReply::Confirmation(c) => assert_eq!(c.id, "m1"),
      other => panic!("expected confirmation, got {:?}", other),
    }
  }

  #[test]
  fn test_submit_without_auto_confirm_terminal() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .times(1)
      .returning(|_| Ok(json!([{"order_id": "5"}])));
    let reply = manager(conn, 16).submit_orders(&ctx(), &[sample_order()], false).unwrap();
    assert!(reply.is_placed());
  }

  #[test]
  fn test_confirmation_limit_exceeded() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .times(3) // 1 submission + 2 replies
      .returning(|_| Ok(json!([{"id": "loop", "message": ["again"]}])));

    let err = manager(conn, 2).submit_orders(&ctx(), &[sample_order()], true).unwrap_err();
    assert!(matches!(err, IBKRError::ConfirmationLimitExceeded(2)));
  }

  #[test]
  fn test_unrecognized_body_is_returned_verbatim() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .times(1)
      .returning(|_| Ok(json!({"error": "Order couldn't be submitted: Local order ID=1 is already registered."})));

    let reply = manager(conn, 16).submit_orders(&ctx(), &[sample_order()], true).unwrap();
    match reply {
      OrderReply::Unrecognized(body) => assert!(body.contains_key("error")),
      other => panic!("expected unrecognized, got {:?}", other),
    }
  }

  #[test]
  fn test_empty_orders_rejected_before_network() {
    let mut conn = MockConnection::new();
    conn.expect_execute().never();
    let err = manager(conn, 16).submit_orders(&ctx(), &[], true).unwrap_err();
    assert!(matches!(err, IBKRError::InvalidParameter(_)));
  }

  #[test]
  fn test_transport_error_propagates_mid_chain() {
    let mut seq = Sequence::new();
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "iserver/account/DU123/orders")
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!([{"id": "m1", "message": ["Risk warning"]}])));
    conn.expect_execute()
      .withf(|req| req.path == "iserver/reply/m1")
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Err(IBKRError::ConnectionFailed("reset by peer".to_string())));

    let err = manager(conn, 16).submit_orders(&ctx(), &[sample_order()], true).unwrap_err();
    assert!(matches!(err, IBKRError::ConnectionFailed(_)));
  }

  #[test]
  fn test_reply_yes_single_call_returns_first_element() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.method == HttpMethod::Post && req.path == "iserver/reply/abc")
      .times(1)
      .returning(|_| Ok(json!([{"id": "def", "message": ["next"]}, {"id": "ignored"}])));

    let reply = manager(conn, 16).reply_yes("abc").unwrap();
    assert_eq!(reply.raw(), json!({"id": "def", "message": ["next"]}).as_object().unwrap());
  }

  #[test]
  fn test_modify_blank_id_rejected_before_network() {
    let mut conn = MockConnection::new();
    conn.expect_execute().never();
    let err = manager(conn, 16).modify_order(&ctx(), "  ", &sample_order(), true).unwrap_err();
    assert!(matches!(err, IBKRError::InvalidParameter(_)));
  }

  #[test]
  fn test_modify_resolves_confirmations() {
    let mut seq = Sequence::new();
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.path == "iserver/account/DU123/order/1258176643" && req.body.as_ref().map(|b| b["conid"] == json!(265598)).unwrap_or(false))
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!([{"id": "c1", "message": ["Price exceeds cap"]}])));
    conn.expect_execute()
      .withf(|req| req.path == "iserver/reply/c1")
      .times(1)
      .in_sequence(&mut seq)
      .returning(|_| Ok(json!([{"order_id": "1258176643", "order_status": "Submitted"}])));

    let reply = manager(conn, 16).modify_order(&ctx(), "1258176643", &sample_order(), true).unwrap();
    assert_eq!(reply.order_id().as_deref(), Some("1258176643"));
  }

  #[test]
  fn test_list_live_orders_repeats_filter_param() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| {
        req.method == HttpMethod::Get
          && req.path == "iserver/account/orders"
          && req.query == vec![("filters".to_string(), "filled".to_string()), ("filters".to_string(), "cancelled".to_string())]
      })
      .times(1)
      .returning(|_| Ok(json!({"orders": [], "snapshot": true})));

    let body = manager(conn, 16).list_live_orders(&[OrderFilter::Filled, OrderFilter::Cancelled]).unwrap();
    assert_eq!(body["snapshot"], json!(true));
  }

  #[test]
  fn test_cancel_and_status_paths() {
    let mut conn = MockConnection::new();
    conn.expect_execute()
      .withf(|req| req.method == HttpMethod::Delete && req.path == "iserver/account/DU123/order/55")
      .times(1)
      .returning(|_| Ok(json!({"msg": "Request was submitted", "order_id": 55})));
    conn.expect_execute()
      .withf(|req| req.method == HttpMethod::Get && req.path == "iserver/account/order/status/55")
      .times(1)
      .returning(|_| Ok(json!({"order_id": 55, "order_status": "Cancelled"})));

    let mgr = manager(conn, 16);
    assert_eq!(mgr.cancel_order(&ctx(), "55").unwrap()["msg"], json!("Request was submitted"));
    assert_eq!(mgr.get_order_status("55").unwrap()["order_status"], json!("Cancelled"));
  }
}
