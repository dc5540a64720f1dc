use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::descriptor::{Payload, RequestDescriptor};
use crate::envelope::{error_data, normalize};
use crate::error::ApiError;
use crate::transport::{OutgoingBody, OutgoingRequest, Transport};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Outcome of sending a descriptor once.
#[derive(Debug)]
pub(crate) enum Attempt {
    Done(Result<Value, ApiError>),
    /// 401 on a request that carried `token`; eligible for refresh.
    Unauthorized { token: String, error: ApiError },
}

impl Attempt {
    pub(crate) fn into_result(self) -> Result<Value, ApiError> {
        match self {
            Self::Done(result) => result,
            Self::Unauthorized { error, .. } => Err(error),
        }
    }
}

pub(crate) fn auth_header(token: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|err| ApiError::InvalidRequest(format!("invalid session token: {err}")))
}

/// Final header set for one attempt. Caller headers are kept except that a
/// multipart payload never carries an explicit content-type and the
/// authorization header always reflects `token`.
pub fn resolve_headers(
    descriptor: &RequestDescriptor,
    token: Option<&str>,
) -> Result<HeaderMap, ApiError> {
    let mut headers = descriptor.headers.clone();
    headers.remove(AUTHORIZATION);
    match &descriptor.payload {
        Some(Payload::Multipart(_)) => {
            headers.remove(CONTENT_TYPE);
        }
        Some(Payload::Json(_)) => {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            }
        }
        None => {}
    }
    if let Some(token) = token {
        headers.insert(AUTHORIZATION, auth_header(token)?);
    }
    Ok(headers)
}

pub fn build_request(
    config: &ClientConfig,
    descriptor: &RequestDescriptor,
    token: Option<&str>,
) -> Result<OutgoingRequest, ApiError> {
    let headers = resolve_headers(descriptor, token)?;
    let body = match &descriptor.payload {
        Some(Payload::Json(value)) => {
            let encoded = serde_json::to_vec(value)
                .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
            Some(OutgoingBody::Bytes(Bytes::from(encoded)))
        }
        Some(Payload::Multipart(form)) => Some(OutgoingBody::Multipart(form.clone())),
        None => None,
    };
    Ok(OutgoingRequest {
        method: descriptor.method.clone(),
        url: config.url_for(&descriptor.target),
        query: descriptor.query.clone(),
        headers,
        body,
    })
}

pub(crate) async fn send_once(
    transport: &dyn Transport,
    config: &ClientConfig,
    descriptor: &RequestDescriptor,
    token: Option<&str>,
) -> Attempt {
    let request = match build_request(config, descriptor, token) {
        Ok(request) => request,
        Err(err) => return Attempt::Done(Err(err)),
    };
    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(err) => return Attempt::Done(Err(err.into())),
    };

    if response.status.is_success() {
        return Attempt::Done(normalize(&response.body, config.success_code));
    }

    let error = ApiError::Status {
        status: response.status,
        data: error_data(&response.body),
    };
    match token {
        Some(token) if response.status == StatusCode::UNAUTHORIZED => {
            debug!(
                method = %descriptor.method,
                target = %descriptor.target,
                "request unauthorized with session token"
            );
            Attempt::Unauthorized {
                token: token.to_string(),
                error,
            }
        }
        _ => Attempt::Done(Err(error)),
    }
}
