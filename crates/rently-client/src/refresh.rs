//! Single-flight token refresh.
//!
//! The first request to see a 401 for the current token claims the cycle and
//! calls the refresh endpoint. Requests that hit 401 while the cycle is open
//! park on a one-shot channel and are woken in arrival order once the outcome
//! is known. Claiming and draining both happen under one mutex that is never
//! held across an await, so `(refreshing, queue)` only ever rests at
//! `(false, [])` between cycles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ApiError, RefreshError};
use crate::session::{SessionEvent, SessionTeardown};
use crate::transport::{OutgoingBody, OutgoingRequest, Transport};

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Waiter>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    result: Option<RefreshResult>,
}

#[derive(Deserialize)]
struct RefreshResult {
    token: String,
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    credentials: Arc<CredentialStore>,
    teardown: Arc<SessionTeardown>,
    transport: Arc<dyn Transport>,
    refresh_url: String,
    timeout: Duration,
    refresh_calls: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        teardown: Arc<SessionTeardown>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            credentials,
            teardown,
            transport,
            refresh_url: config.refresh_url(),
            timeout: config.refresh_timeout,
            refresh_calls: AtomicU64::new(0),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of calls made to the refresh endpoint.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Resolves a 401 received by a request that carried `stale`.
    ///
    /// Returns the token to replay with, or `SessionExpired` when the session
    /// cannot be recovered. Never replays anything itself. A waiter whose
    /// cycle was abandoned by its initiator tries to claim a new one.
    pub async fn handle_unauthorized(&self, stale: &str) -> Result<String, ApiError> {
        loop {
            let waiter = {
                let mut state = self.lock();
                if state.refreshing {
                    let (tx, rx) = oneshot::channel();
                    state.queue.push_back(tx);
                    debug!(position = state.queue.len(), "waiting for in-flight refresh");
                    Some(rx)
                } else {
                    match self.credentials.get() {
                        None => {
                            debug!("session already ended; not refreshing");
                            return Err(ApiError::SessionExpired);
                        }
                        Some(current) if current != stale => {
                            debug!("token already rotated; replaying with current token");
                            return Ok(current);
                        }
                        Some(_) => {}
                    }
                    state.refreshing = true;
                    None
                }
            };

            let Some(rx) = waiter else {
                return self.run_cycle(stale).await;
            };
            match rx.await {
                Ok(Ok(token)) => return Ok(token),
                Ok(Err(RefreshError::Cancelled)) | Err(_) => {
                    debug!("in-flight refresh abandoned; retrying");
                }
                Ok(Err(err)) => {
                    debug!(error = %err, "queued request failed with refresh");
                    return Err(ApiError::SessionExpired);
                }
            }
        }
    }

    async fn run_cycle(&self, stale: &str) -> Result<String, ApiError> {
        let mut guard = CycleGuard {
            coordinator: self,
            armed: true,
        };
        info!("session token rejected; refreshing");
        let outcome = self.request_refresh(stale).await;
        guard.armed = false;

        match outcome {
            Ok(token) if self.credentials.replace(stale, token.clone()) => {
                let waiters = self.finish_cycle();
                info!(waiters = waiters.len(), "session token refreshed");
                self.teardown.publish(SessionEvent::Refreshed {
                    token: token.clone(),
                });
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
                Ok(token)
            }
            Ok(_) => {
                // The session moved on while the call was in flight: logout
                // cleared it or a new login replaced it.
                let waiters = self.finish_cycle();
                match self.credentials.get() {
                    Some(current) => {
                        info!("session replaced during refresh; discarding refreshed token");
                        for waiter in waiters {
                            let _ = waiter.send(Ok(current.clone()));
                        }
                        Ok(current)
                    }
                    None => {
                        info!("session ended during refresh; discarding refreshed token");
                        for waiter in waiters {
                            let _ = waiter.send(Err(RefreshError::SessionEnded));
                        }
                        Err(ApiError::SessionExpired)
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                self.credentials.clear();
                let waiters = self.finish_cycle();
                self.teardown.run(&err.to_string());
                for waiter in waiters {
                    let _ = waiter.send(Err(err.clone()));
                }
                Err(ApiError::SessionExpired)
            }
        }
    }

    async fn request_refresh(&self, stale: &str) -> Result<String, RefreshError> {
        let body = serde_json::to_vec(&RefreshRequest { token: stale })
            .map_err(|err| RefreshError::Malformed(err.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let request = OutgoingRequest {
            method: Method::POST,
            url: self.refresh_url.clone(),
            query: Vec::new(),
            headers,
            body: Some(OutgoingBody::Bytes(Bytes::from(body))),
        };

        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let response = match tokio::time::timeout(self.timeout, self.transport.send(request)).await
        {
            Err(_) => return Err(RefreshError::TimedOut(self.timeout)),
            Ok(Err(err)) => return Err(RefreshError::Transport(err.to_string())),
            Ok(Ok(response)) => response,
        };
        if !response.status.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        let parsed: RefreshResponse = serde_json::from_slice(&response.body)
            .map_err(|err| RefreshError::Malformed(err.to_string()))?;
        parsed
            .result
            .map(|result| result.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RefreshError::Malformed("result.token".to_string()))
    }

    /// Ends the current cycle and hands back the queued waiters in FIFO order.
    fn finish_cycle(&self) -> VecDeque<Waiter> {
        let mut state = self.lock();
        state.refreshing = false;
        std::mem::take(&mut state.queue)
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the claim if the refreshing future is dropped before the refresh
/// call completes. Credentials are left alone and queued waiters are told to
/// claim again.
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("refresh cancelled before completion");
        for waiter in self.coordinator.finish_cycle() {
            let _ = waiter.send(Err(RefreshError::Cancelled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::RawResponse;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::{json, Value};

    struct FixedRefresh {
        status: StatusCode,
        body: Value,
        delay: Duration,
        seen: Mutex<Vec<Value>>,
    }

    impl FixedRefresh {
        fn new(status: StatusCode, body: Value) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedRefresh {
        async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError> {
            if let Some(OutgoingBody::Bytes(bytes)) = &request.body {
                let value = serde_json::from_slice(bytes).unwrap_or(Value::Null);
                self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(value);
            }
            tokio::time::sleep(self.delay).await;
            Ok(RawResponse {
                status: self.status,
                body: Bytes::from(self.body.to_string()),
            })
        }
    }

    fn coordinator(
        transport: Arc<dyn Transport>,
        token: Option<&str>,
        timeout: Duration,
    ) -> (RefreshCoordinator, Arc<CredentialStore>, Arc<SessionTeardown>) {
        let credentials = Arc::new(match token {
            Some(token) => CredentialStore::with_token(token),
            None => CredentialStore::new(),
        });
        let teardown = Arc::new(SessionTeardown::new(credentials.clone()));
        let config = ClientConfig::new("http://api.local").with_refresh_timeout(timeout);
        let coordinator =
            RefreshCoordinator::new(&config, transport, credentials.clone(), teardown.clone());
        (coordinator, credentials, teardown)
    }

    #[tokio::test]
    async fn success_stores_token_and_sends_expired_one() -> Result<(), ApiError> {
        let transport = FixedRefresh::new(StatusCode::OK, json!({ "result": { "token": "t2" } }));
        let (coordinator, credentials, teardown) =
            coordinator(transport.clone(), Some("t1"), Duration::from_secs(5));
        let mut events = teardown.subscribe();

        let token = coordinator.handle_unauthorized("t1").await?;

        assert_eq!(token, "t2");
        assert_eq!(credentials.get().as_deref(), Some("t2"));
        assert_eq!(coordinator.refresh_calls(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.queued(), 0);
        let seen = transport.seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(seen, vec![json!({ "token": "t1" })]);
        assert_eq!(
            events.try_recv().ok(),
            Some(SessionEvent::Refreshed {
                token: "t2".to_string()
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn rejection_tears_down_session() {
        let transport = FixedRefresh::new(StatusCode::FORBIDDEN, json!({ "message": "expired" }));
        let (coordinator, credentials, teardown) =
            coordinator(transport, Some("t1"), Duration::from_secs(5));

        let result = coordinator.handle_unauthorized("t1").await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(credentials.get(), None);
        assert_eq!(teardown.runs(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn missing_token_in_response_is_failure() {
        let transport = FixedRefresh::new(StatusCode::OK, json!({ "result": null }));
        let (coordinator, credentials, teardown) =
            coordinator(transport, Some("t1"), Duration::from_secs(5));

        let result = coordinator.handle_unauthorized("t1").await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert!(!credentials.is_authenticated());
        assert_eq!(teardown.runs(), 1);
    }

    #[tokio::test]
    async fn hung_refresh_times_out() {
        let transport = Arc::new(FixedRefresh {
            status: StatusCode::OK,
            body: json!({ "result": { "token": "t2" } }),
            delay: Duration::from_secs(10),
            seen: Mutex::new(Vec::new()),
        });
        let (coordinator, credentials, teardown) =
            coordinator(transport, Some("t1"), Duration::from_millis(50));

        let result = coordinator.handle_unauthorized("t1").await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert!(!credentials.is_authenticated());
        assert_eq!(teardown.runs(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn rotated_token_skips_refresh() -> Result<(), ApiError> {
        let transport = FixedRefresh::new(StatusCode::OK, json!({ "result": { "token": "t3" } }));
        let (coordinator, _credentials, _teardown) =
            coordinator(transport, Some("t2"), Duration::from_secs(5));

        let token = coordinator.handle_unauthorized("t1").await?;

        assert_eq!(token, "t2");
        assert_eq!(coordinator.refresh_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn cleared_session_skips_refresh() {
        let transport = FixedRefresh::new(StatusCode::OK, json!({ "result": { "token": "t3" } }));
        let (coordinator, _credentials, teardown) =
            coordinator(transport, None, Duration::from_secs(5));

        let result = coordinator.handle_unauthorized("t1").await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(coordinator.refresh_calls(), 0);
        assert_eq!(teardown.runs(), 0);
    }

    #[tokio::test]
    async fn dropped_initiator_releases_claim() {
        let transport = Arc::new(FixedRefresh {
            status: StatusCode::OK,
            body: json!({ "result": { "token": "t2" } }),
            delay: Duration::from_secs(10),
            seen: Mutex::new(Vec::new()),
        });
        let (coordinator, credentials, _teardown) =
            coordinator(transport, Some("t1"), Duration::from_secs(30));

        let attempt = tokio::time::timeout(
            Duration::from_millis(50),
            coordinator.handle_unauthorized("t1"),
        )
        .await;

        assert!(attempt.is_err());
        assert!(!coordinator.is_refreshing());
        assert_eq!(credentials.get().as_deref(), Some("t1"));
    }
}
