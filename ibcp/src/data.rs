// ibcp/src/data.rs
// Market data structures for the Client Portal API

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Bar granularity accepted by `iserver/marketdata/history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarSize {
  Min1,
  Min2,
  Min3,
  Min5,
  Min10,
  Min15,
  Min30,
  Hour1,
  Hour2,
  Hour3,
  Hour4,
  Hour8,
  #[default]
  Day1,
  Week1,
  Month1,
}

impl fmt::Display for BarSize {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      BarSize::Min1 => "1min",
      BarSize::Min2 => "2min",
      BarSize::Min3 => "3min",
      BarSize::Min5 => "5min",
      BarSize::Min10 => "10min",
      BarSize::Min15 => "15min",
      BarSize::Min30 => "30min",
      BarSize::Hour1 => "1h",
      BarSize::Hour2 => "2h",
      BarSize::Hour3 => "3h",
      BarSize::Hour4 => "4h",
      BarSize::Hour8 => "8h",
      BarSize::Day1 => "1d",
      BarSize::Week1 => "1w",
      BarSize::Month1 => "1m",
    };
    write!(f, "{}", s)
  }
}

/// One bar. Prices are already divided by the gateway's price factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
  #[serde(rename = "o")]
  pub open: f64,
  #[serde(rename = "h")]
  pub high: f64,
  #[serde(rename = "l")]
  pub low: f64,
  #[serde(rename = "c")]
  pub close: f64,
  #[serde(rename = "v", default)]
  pub volume: f64,
  /// Bar start, epoch milliseconds.
  #[serde(rename = "t")]
  pub time_ms: i64,
}

impl Bar {
  pub fn time(&self) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(self.time_ms).single()
  }
}

/// Response of `iserver/marketdata/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBars {
  #[serde(default)]
  pub symbol: Option<String>,
  #[serde(default)]
  pub text: Option<String>,
  #[serde(rename = "timePeriod", default)]
  pub time_period: Option<String>,
  #[serde(rename = "barLength", default)]
  pub bar_length_secs: Option<i64>,
  #[serde(rename = "mdAvailability", default)]
  pub md_availability: Option<String>,
  #[serde(rename = "outsideRth", default)]
  pub outside_rth: Option<bool>,
  #[serde(default)]
  pub data: Vec<Bar>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}
