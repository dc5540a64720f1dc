use chrono::Utc;
use rently_client::{ApiClient, ClientConfig, SessionEvent};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use super::types::CliConfig;
use crate::modules::auth::{delete_session_token, store_session_token};

pub(crate) fn build_client(addr: &str, allow_insecure: bool) -> anyhow::Result<ApiClient> {
    let config = ClientConfig::new(addr).with_insecure(allow_insecure);
    Ok(ApiClient::new(config)?)
}

/// Applies session events raised while a command ran: a refreshed token is
/// written back to the keyring, an ended session removes it.
pub(crate) fn sync_session(
    events: &mut broadcast::Receiver<SessionEvent>,
    context_name: &str,
    config: &mut CliConfig,
) -> anyhow::Result<()> {
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Refreshed { token }) => {
                store_session_token(context_name, &token)?;
                if let Some(context) = config.contexts.get_mut(context_name) {
                    context.refreshed_at = Some(Utc::now().to_rfc3339());
                }
            }
            Ok(SessionEvent::Expired { reason }) => {
                debug!(context = %context_name, reason = %reason, "dropping stored session");
                delete_session_token(context_name)?;
                if let Some(context) = config.contexts.get_mut(context_name) {
                    context.logged_in_at = None;
                    context.refreshed_at = None;
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "missed session events");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}
