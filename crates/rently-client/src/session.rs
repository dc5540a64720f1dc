use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::credentials::CredentialStore;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh cycle stored a new token.
    Refreshed { token: String },
    /// The session ended; observers should return to an unauthenticated state.
    Expired { reason: String },
}

/// Clears credentials and tells observers the session is over.
///
/// The refresh coordinator calls [`SessionTeardown::run`] once per failed
/// cycle, never once per queued waiter.
#[derive(Debug)]
pub struct SessionTeardown {
    credentials: Arc<CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
    runs: AtomicU64,
}

impl SessionTeardown {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            credentials,
            events,
            runs: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn run(&self, reason: &str) {
        self.credentials.clear();
        self.runs.fetch_add(1, Ordering::SeqCst);
        warn!(reason = %reason, "session ended");
        self.publish(SessionEvent::Expired {
            reason: reason.to_string(),
        });
    }

    /// Number of teardowns performed so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("no session observers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_clears_token_and_notifies() {
        let credentials = Arc::new(CredentialStore::with_token("t1"));
        let teardown = SessionTeardown::new(credentials.clone());
        let mut events = teardown.subscribe();

        teardown.run("refresh failed");

        assert_eq!(credentials.get(), None);
        assert_eq!(teardown.runs(), 1);
        assert_eq!(
            events.try_recv().ok(),
            Some(SessionEvent::Expired {
                reason: "refresh failed".to_string()
            })
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn run_without_observers_does_not_fail() {
        let credentials = Arc::new(CredentialStore::new());
        let teardown = SessionTeardown::new(credentials.clone());
        teardown.run("logout");
        teardown.run("logout");
        assert_eq!(teardown.runs(), 2);
        assert!(!credentials.is_authenticated());
    }
}
