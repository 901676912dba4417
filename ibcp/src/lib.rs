// ibcp/src/lib.rs
// Main entry point for the Client Portal API library

//! # ibcp
//!
//! A synchronous Rust client for the Interactive Brokers Client Portal Web API
//! (the locally running HTTPS gateway). It provides:
//!
//! - Order placement with automatic handling of the confirmation handshake
//! - Account, ledger and position queries against an explicit account context
//! - Contract id lookup and historical bars
//! - Session keep-alive and authentication status
//! - Recording of every exchange to SQLite, and offline replay of a recording

mod base;
mod order_builder;
pub mod account;
pub mod order;
pub mod data;
pub mod conn;
pub mod conn_log;
pub mod conn_mock;
pub mod order_manager;
pub mod account_manager;
pub mod data_ref_manager;
pub mod data_market_manager;
pub mod client;

pub use order_builder::OrderBuilder;
pub use base::IBKRError;
pub use client::IBKRClient;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
