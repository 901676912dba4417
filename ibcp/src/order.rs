// ibcp/src/order.rs
// Order data structures for the Client Portal API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Order request parameters, serialized with the gateway's field names.
///
/// Nothing here is validated client-side; the gateway reports problems in
/// its response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
  pub conid: i64,
  #[serde(rename = "orderType")]
  pub order_type: OrderType,
  pub side: OrderSide,
  pub quantity: f64,
  pub tif: TimeInForce,

  // Price fields (used depending on order type)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(rename = "auxPrice", skip_serializing_if = "Option::is_none")]
  pub aux_price: Option<f64>, // Stop price for stop-limit orders
  #[serde(rename = "trailingAmt", skip_serializing_if = "Option::is_none")]
  pub trailing_amount: Option<f64>,
  #[serde(rename = "trailingType", skip_serializing_if = "Option::is_none")]
  pub trailing_type: Option<String>, // "amt" or "%"

  // Identification
  #[serde(rename = "cOID", skip_serializing_if = "Option::is_none")]
  pub client_order_id: Option<String>,
  #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<String>,
  #[serde(rename = "acctId", skip_serializing_if = "Option::is_none")]
  pub account_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub referrer: Option<String>,

  // Contract hints
  #[serde(rename = "secType", skip_serializing_if = "Option::is_none")]
  pub sec_type: Option<String>, // e.g. "265598:STK"
  #[serde(rename = "listingExchange", skip_serializing_if = "Option::is_none")]
  pub listing_exchange: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ticker: Option<String>,

  // Flags
  #[serde(rename = "outsideRTH", skip_serializing_if = "Option::is_none")]
  pub outside_rth: Option<bool>,
  #[serde(rename = "useAdaptive", skip_serializing_if = "Option::is_none")]
  pub use_adaptive: Option<bool>,
  #[serde(rename = "isCcyConv", skip_serializing_if = "Option::is_none")]
  pub is_ccy_conv: Option<bool>,
  #[serde(rename = "isSingleGroup", skip_serializing_if = "Option::is_none")]
  pub is_single_group: Option<bool>,

  /// Any other field the gateway accepts, passed through untouched.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Default for OrderRequest {
  fn default() -> Self {
    OrderRequest {
      conid: 0,
      order_type: OrderType::Market,
      side: OrderSide::Buy,
      quantity: 0.0,
      tif: TimeInForce::Day,
      price: None,
      aux_price: None,
      trailing_amount: None,
      trailing_type: None,
      client_order_id: None,
      parent_id: None,
      account_id: None,
      referrer: None,
      sec_type: None,
      listing_exchange: None,
      ticker: None,
      outside_rth: None,
      use_adaptive: None,
      is_ccy_conv: None,
      is_single_group: None,
      extra: Map::new(),
    }
  }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
  #[serde(rename = "BUY")]
  Buy,
  #[serde(rename = "SELL")]
  Sell,
}

impl fmt::Display for OrderSide {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OrderSide::Buy => write!(f, "BUY"),
      OrderSide::Sell => write!(f, "SELL"),
    }
  }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
  #[serde(rename = "MKT")]
  Market,
  #[serde(rename = "LMT")]
  Limit,
  #[serde(rename = "STP")]
  Stop,
  #[serde(rename = "STOP_LIMIT")]
  StopLimit,
  #[serde(rename = "MIDPRICE")]
  MidPrice,
  #[serde(rename = "TRAIL")]
  TrailingStop,
  #[serde(rename = "TRAILLMT")]
  TrailingStopLimit,
}

impl fmt::Display for OrderType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      OrderType::Market => "MKT",
      OrderType::Limit => "LMT",
      OrderType::Stop => "STP",
      OrderType::StopLimit => "STOP_LIMIT",
      OrderType::MidPrice => "MIDPRICE",
      OrderType::TrailingStop => "TRAIL",
      OrderType::TrailingStopLimit => "TRAILLMT",
    };
    write!(f, "{}", s)
  }
}

/// Time in force for orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
  #[serde(rename = "DAY")]
  Day,
  #[serde(rename = "GTC")]
  GoodTillCancelled,
  #[serde(rename = "OPG")]
  AtTheOpening,
  #[serde(rename = "IOC")]
  ImmediateOrCancel,
  #[serde(rename = "PAX")]
  Pax, // Crypto only
}

impl fmt::Display for TimeInForce {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      TimeInForce::Day => "DAY",
      TimeInForce::GoodTillCancelled => "GTC",
      TimeInForce::AtTheOpening => "OPG",
      TimeInForce::ImmediateOrCancel => "IOC",
      TimeInForce::Pax => "PAX",
    };
    write!(f, "{}", s)
  }
}

/// Filters accepted by the live orders endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
  Inactive,
  PendingSubmit,
  PreSubmitted,
  Submitted,
  Filled,
  PendingCancel,
  Cancelled,
  WarnState,
  SortByTime,
}

impl fmt::Display for OrderFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      OrderFilter::Inactive => "inactive",
      OrderFilter::PendingSubmit => "pending_submit",
      OrderFilter::PreSubmitted => "pre_submitted",
      OrderFilter::Submitted => "submitted",
      OrderFilter::Filled => "filled",
      OrderFilter::PendingCancel => "pending_cancel",
      OrderFilter::Cancelled => "cancelled",
      OrderFilter::WarnState => "warn_state",
      OrderFilter::SortByTime => "sort_by_time",
    };
    write!(f, "{}", s)
  }
}

fn value_as_id(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Terminal answer to an order submission: carries `order_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
  raw: Map<String, Value>,
}

impl OrderResult {
  /// The order id as a string, whether the gateway sent a string or a number.
  pub fn order_id(&self) -> String {
    self.raw.get("order_id").and_then(value_as_id).unwrap_or_default()
  }

  pub fn order_status(&self) -> Option<&str> {
    self.raw.get("order_status").and_then(Value::as_str)
  }

  pub fn raw(&self) -> &Map<String, Value> { &self.raw }
}

/// A prompt the gateway wants answered before the order proceeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationMessage {
  pub id: String,
  pub messages: Vec<String>,
  raw: Map<String, Value>,
}

impl ConfirmationMessage {
  /// All prompt lines joined for display.
  pub fn prompt(&self) -> String {
    self.messages.join("\n")
  }

  pub fn raw(&self) -> &Map<String, Value> { &self.raw }
}

/// One classified response element from the order or reply endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderReply {
  /// `order_id` present.
  Placed(OrderResult),
  /// No `order_id`, but an `id` to reply to.
  Confirmation(ConfirmationMessage),
  /// Neither; typically `{"error": "..."}`. Passed through verbatim.
  Unrecognized(Map<String, Value>),
}

impl OrderReply {
  pub fn from_map(map: Map<String, Value>) -> Self {
    if map.contains_key("order_id") {
      return OrderReply::Placed(OrderResult { raw: map });
    }
    match map.get("id").and_then(value_as_id) {
      Some(id) => {
        let messages = match map.get("message") {
          Some(Value::Array(items)) => items.iter()
            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
            .collect(),
          Some(Value::String(s)) => vec![s.clone()],
          Some(Value::Null) | None => Vec::new(),
          Some(other) => vec![other.to_string()],
        };
        OrderReply::Confirmation(ConfirmationMessage { id, messages, raw: map })
      }
      None => OrderReply::Unrecognized(map),
    }
  }

  pub fn is_placed(&self) -> bool {
    matches!(self, OrderReply::Placed(_))
  }

  pub fn order_id(&self) -> Option<String> {
    match self {
      OrderReply::Placed(result) => Some(result.order_id()),
      _ => None,
    }
  }

  /// The response element exactly as received.
  pub fn raw(&self) -> &Map<String, Value> {
    match self {
      OrderReply::Placed(r) => r.raw(),
      OrderReply::Confirmation(c) => c.raw(),
      OrderReply::Unrecognized(m) => m,
    }
  }
}
