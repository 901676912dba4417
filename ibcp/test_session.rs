// ibcp/test_session.rs
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use ibcp::IBKRClient;

pub(super) fn auth_status_impl(client: &IBKRClient, _is_live: bool) -> Result<()> {
  info!("--- Testing Session Keep-Alive and Auth Status ---");
  let session = client.client();

  let tickle = session.ping_server().context("tickle failed")?;
  info!("Tickle: {}", tickle);

  let status = session.auth_status().context("auth status failed")?;
  info!("Auth status: {}", status);
  match status.get("authenticated").and_then(|v| v.as_bool()) {
    Some(true) => Ok(()),
    Some(false) => {
      warn!("Log in through the gateway's browser page, then rerun.");
      Err(anyhow!("Gateway session is not authenticated"))
    }
    None => Err(anyhow!("Auth status has no 'authenticated' field: {}", status)),
  }
}
