// cp_goldens.rs
// Use it like this:
// cp_goldens live auth-status --db-path goldens.db
// cp_goldens replay all --db-path goldens.db
// Look for "Test registration" below for available test cases.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::PathBuf;
use ibcp::{IBKRClient, client::ClientConfig};

mod test_session;
mod test_account;
mod test_data;
mod test_order;

// --- Test Definition Infrastructure ---

type TestFn = fn(client: &IBKRClient, is_live: bool) -> Result<()>;

#[derive(Debug, Clone)]
pub struct TestDefinition {
  pub name: &'static str, // Also the session name in the database
  pub func: TestFn,
}

inventory::collect!(TestDefinition);

static TEST_REGISTRY: Lazy<HashMap<&'static str, &'static TestDefinition>> = Lazy::new(|| {
  inventory::iter::<TestDefinition>
    .into_iter()
    .map(|test_def| (test_def.name, test_def))
    .collect()
});

// --- CLI Argument Parsing ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[clap(subcommand)]
  command: Command,
}

#[derive(Parser, Debug)]
enum Command {
  /// Run scenarios against a live gateway, recording every exchange.
  Live(ModeArgs),
  /// Replay scenarios from a previously recorded database session.
  Replay(ModeArgs),
}

#[derive(Parser, Debug)]
struct ModeArgs {
  /// Scenario name (e.g. auth-status, portfolio, order-submit) or "all".
  /// Also used as the session name in the database.
  #[arg()]
  test_name_or_all: String,

  /// Gateway origin.
  #[arg(long, default_value = ibcp::client::DEFAULT_GATEWAY_URL)]
  url: String,

  /// Verify the gateway's TLS certificate (it is self-signed by default).
  #[arg(long, default_value_t = false)]
  verify_ssl: bool,

  /// Path to the SQLite database for recording/replaying interactions.
  #[arg(long, default_value = "ibcp_golden.db")]
  db_path: PathBuf,
}

// --- Test Registration ---
inventory::submit! { TestDefinition { name: "auth-status", func: test_session::auth_status_impl } }
inventory::submit! { TestDefinition { name: "accounts", func: test_account::accounts_impl } }
inventory::submit! { TestDefinition { name: "portfolio", func: test_account::portfolio_impl } }
inventory::submit! { TestDefinition { name: "conid-lookup", func: test_data::conid_lookup_impl } }
inventory::submit! { TestDefinition { name: "history-bars", func: test_data::history_bars_impl } }
inventory::submit! { TestDefinition { name: "live-orders", func: test_order::live_orders_impl } }
inventory::submit! { TestDefinition { name: "order-submit", func: test_order::order_submit_impl } }

// --- Helper Functions ---

fn create_live_client(args: &ModeArgs, session: &str) -> Result<IBKRClient> {
  info!("Creating LIVE client for session '{}' (Gateway: {})", session, args.url);
  info!("Logging to DB: {:?}", args.db_path);

  if let Some(parent) = args.db_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("Failed to create directory for DB: {:?}", parent))?;
  }

  let config = ClientConfig {
    base_url: args.url.clone(),
    verify_ssl: args.verify_ssl,
    log_config: Some((args.db_path.to_string_lossy().to_string(), session.to_string())),
    ..ClientConfig::default()
  };
  IBKRClient::new(config).context("Failed to create IBKRClient for live connection")
}

fn create_replay_client(args: &ModeArgs, session: &str) -> Result<IBKRClient> {
  info!("Creating REPLAY client for session '{}' from DB: {:?}", session, args.db_path);
  if !args.db_path.exists() {
    return Err(anyhow!("Database path does not exist: {:?}", args.db_path));
  }
  IBKRClient::from_db(&args.db_path.to_string_lossy(), session, &ClientConfig::default())
    .context("Failed to create IBKRClient for replay")
}

fn run_one(test_def: &TestDefinition, mode_args: &ModeArgs, is_live: bool) -> bool {
  let mode_str = if is_live { "Live" } else { "Replay" };
  let session_name = test_def.name;
  info!("===== Preparing Test: {} ({}) =====", session_name, mode_str);

  let client_result = if is_live {
    create_live_client(mode_args, session_name)
  } else {
    create_replay_client(mode_args, session_name)
  };

  match client_result {
    Ok(client) => match (test_def.func)(&client, is_live) {
      Ok(()) => {
        info!("Test PASSED: {} ({}).", session_name, mode_str);
        true
      }
      Err(e) => {
        error!("Test FAILED: {} ({}): {:#}", session_name, mode_str, e);
        false
      }
    },
    Err(e) => {
      error!("Failed to create client for test '{}' ({}): {:#}", session_name, mode_str, e);
      false
    }
  }
}

// --- Main Execution Logic ---
fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  Lazy::force(&TEST_REGISTRY);
  info!("Registered tests: {:?}", TEST_REGISTRY.keys().collect::<Vec<_>>());

  let args = Args::parse();
  let (mode_args, is_live) = match args.command {
    Command::Live(m) => (m, true),
    Command::Replay(m) => (m, false),
  };

  let mut overall_success = true;
  if mode_args.test_name_or_all.eq_ignore_ascii_case("all") {
    let mut all_test_defs: Vec<&'static TestDefinition> = TEST_REGISTRY.values().cloned().collect();
    all_test_defs.sort_by_key(|t| t.name);
    if all_test_defs.is_empty() {
      warn!("No tests found in registry for 'all' run.");
      return Ok(());
    }
    for test_def in all_test_defs {
      overall_success &= run_one(test_def, &mode_args, is_live);
      println!("----------------------------------------");
    }
  } else {
    let requested_name = &mode_args.test_name_or_all;
    match TEST_REGISTRY.get(requested_name.as_str()) {
      Some(test_def) => overall_success = run_one(test_def, &mode_args, is_live),
      None => {
        return Err(anyhow!(
          "Unknown test name specified: '{}'. Available tests: {:?}",
          requested_name, TEST_REGISTRY.keys().collect::<Vec<_>>()
        ));
      }
    }
  }

  if overall_success {
    info!("Overall Result: PASSED");
    Ok(())
  } else {
    Err(anyhow!("One or more tests FAILED."))
  }
}
