#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rently_client::{
    ApiClient, ClientConfig, OutgoingRequest, RawResponse, Transport, TransportError,
};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Notify;

pub const BASE: &str = "http://rently.test";
pub const REFRESH_URL: &str = "http://rently.test/auth/refresh";

pub enum RefreshReply {
    Grant,
    Reject(StatusCode),
}

/// In-process backend. Resource requests succeed only with the currently
/// valid token; the refresh endpoint can be held open until released.
pub struct FakeBackend {
    valid_token: Mutex<Option<String>>,
    grants: Mutex<VecDeque<String>>,
    reply: Mutex<RefreshReply>,
    gated: AtomicBool,
    gate: Notify,
    always_unauthorized: AtomicBool,
    refresh_calls: AtomicUsize,
    requests: Mutex<Vec<OutgoingRequest>>,
}

impl FakeBackend {
    pub fn new(valid_token: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new(valid_token.map(str::to_string)),
            grants: Mutex::new(VecDeque::new()),
            reply: Mutex::new(RefreshReply::Grant),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            always_unauthorized: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn grant(&self, token: &str) {
        self.grants.lock().unwrap().push_back(token.to_string());
    }

    pub fn reject_refresh(&self, status: StatusCode) {
        *self.reply.lock().unwrap() = RefreshReply::Reject(status);
    }

    pub fn hold_refresh(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release_refresh(&self) {
        self.gate.notify_one();
    }

    pub fn expire_token(&self) {
        *self.valid_token.lock().unwrap() = None;
    }

    pub fn always_unauthorized(&self) {
        self.always_unauthorized.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OutgoingRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Authorization headers sent to `url`, in send order.
    pub fn auth_headers_for(&self, url: &str) -> Vec<Option<String>> {
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .map(|request| {
                request
                    .headers
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            })
            .collect()
    }

    async fn refresh(&self) -> RawResponse {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        let reply = match &*self.reply.lock().unwrap() {
            RefreshReply::Grant => None,
            RefreshReply::Reject(status) => Some(*status),
        };
        if let Some(status) = reply {
            return respond(status, json!({ "code": status.as_u16(), "message": "refresh denied" }));
        }
        let token = self
            .grants
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "granted".to_string());
        *self.valid_token.lock().unwrap() = Some(token.clone());
        respond(StatusCode::OK, json!({ "code": 200, "result": { "token": token } }))
    }

    fn resource(&self, request: &OutgoingRequest) -> RawResponse {
        let presented = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);
        let valid = self.valid_token.lock().unwrap().clone();
        let authorized = !self.always_unauthorized.load(Ordering::SeqCst)
            && presented.is_some()
            && presented == valid;
        if !authorized {
            return respond(
                StatusCode::UNAUTHORIZED,
                json!({ "code": 401, "message": "token expired" }),
            );
        }
        respond(
            StatusCode::OK,
            json!({ "code": 200, "message": "ok", "result": { "url": request.url, "token": presented } }),
        )
    }
}

fn respond(status: StatusCode, body: Value) -> RawResponse {
    RawResponse {
        status,
        body: Bytes::from(body.to_string()),
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        // Give other tasks a chance to interleave, like a real network hop.
        tokio::task::yield_now().await;
        if request.url == REFRESH_URL {
            return Ok(self.refresh().await);
        }
        Ok(self.resource(&request))
    }
}

pub fn client(backend: &Arc<FakeBackend>) -> ApiClient {
    let config = ClientConfig::new(BASE).with_refresh_timeout(Duration::from_secs(5));
    ApiClient::with_transport(config, backend.clone())
}

/// Yields until `condition` holds. Panics after a generous number of rounds
/// so a broken invariant fails the test instead of hanging it.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
