use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::config::ClientConfig;
use crate::descriptor::MultipartForm;
use crate::error::TransportError;

/// A fully resolved request: absolute URL, final headers, encoded body.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<OutgoingBody>,
}

#[derive(Debug, Clone)]
pub enum OutgoingBody {
    Bytes(Bytes),
    /// Encoded by the transport, which also writes the content-type and
    /// boundary.
    Multipart(MultipartForm),
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// The network seam. Any status code is a successful send; only a missing
/// response is a [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError> {
        let OutgoingRequest {
            method,
            url,
            query,
            headers,
            body,
        } = request;
        let mut builder = self
            .client
            .request(method.clone(), url.as_str())
            .headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        builder = match body {
            Some(OutgoingBody::Bytes(bytes)) => builder.body(bytes),
            Some(OutgoingBody::Multipart(form)) => builder.multipart(form.to_reqwest()?),
            None => builder,
        };

        debug!(method = %method, url = %url, "http request");
        let start = std::time::Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(
            method = %method,
            url = %url,
            status = %status,
            elapsed_ms = start.elapsed().as_millis(),
            "http response"
        );
        Ok(RawResponse { status, body })
    }
}
