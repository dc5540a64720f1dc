use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::descriptor::RequestDescriptor;
use crate::error::ApiError;
use crate::executor::{send_once, Attempt};
use crate::refresh::RefreshCoordinator;
use crate::session::{SessionEvent, SessionTeardown};
use crate::transport::{ReqwestTransport, Transport};

/// Per-call progress. `Refreshing` can only be entered from `Initial` and
/// only leads to `Replaying` or `Done`, and `Replaying` always ends in
/// `Done`, so a call is sent at most twice.
enum Phase {
    Initial,
    Refreshing { stale: String },
    Replaying { token: String },
    Done(Result<Value, ApiError>),
}

/// Entry point for every API call. Cheap to clone; clones share the session
/// and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    teardown: Arc<SessionTeardown>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let credentials = Arc::new(CredentialStore::new());
        let teardown = Arc::new(SessionTeardown::new(credentials.clone()));
        let coordinator = RefreshCoordinator::new(
            &config,
            transport.clone(),
            credentials.clone(),
            teardown.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                credentials,
                teardown,
                coordinator,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn teardown(&self) -> &SessionTeardown {
        &self.inner.teardown
    }

    /// Starts an authenticated session with a token obtained by login.
    pub fn set_token(&self, token: impl Into<String>) {
        self.inner.credentials.set(token);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.teardown.subscribe()
    }

    pub fn logout(&self) {
        self.inner.teardown.run("logout");
    }

    /// Sends `descriptor` and returns the envelope `result`.
    ///
    /// A 401 on a request that carried a token is recovered through the
    /// shared refresh cycle and replayed once with the new token.
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<Value, ApiError> {
        let inner = &self.inner;
        let mut phase = Phase::Initial;
        loop {
            phase = match phase {
                Phase::Initial => {
                    let token = inner.credentials.get();
                    match send_once(
                        inner.transport.as_ref(),
                        &inner.config,
                        descriptor,
                        token.as_deref(),
                    )
                    .await
                    {
                        Attempt::Done(result) => Phase::Done(result),
                        Attempt::Unauthorized { token, .. } => Phase::Refreshing { stale: token },
                    }
                }
                Phase::Refreshing { stale } => {
                    match inner.coordinator.handle_unauthorized(&stale).await {
                        Ok(token) => Phase::Replaying { token },
                        Err(err) => Phase::Done(Err(err)),
                    }
                }
                Phase::Replaying { token } => {
                    debug!(
                        method = %descriptor.method,
                        target = %descriptor.target,
                        "replaying request with refreshed token"
                    );
                    let attempt = send_once(
                        inner.transport.as_ref(),
                        &inner.config,
                        descriptor,
                        Some(&token),
                    )
                    .await;
                    Phase::Done(attempt.into_result())
                }
                Phase::Done(result) => return result,
            };
        }
    }

    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<T, ApiError> {
        let value = self.execute(descriptor).await?;
        serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
    }
}
