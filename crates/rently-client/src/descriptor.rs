use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// One logical API call. Replays reuse the same descriptor; only the
/// `Authorization` header is recomputed per attempt.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub target: String,
    pub payload: Option<Payload>,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Multipart(MultipartForm),
}

/// Replayable multipart body. `reqwest::multipart::Form` is consumed on send,
/// so the parts are kept here and turned into a fresh form per attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub parts: Vec<FormPart>,
}

#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        data: Bytes,
    },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime,
            data: data.into(),
        });
        self
    }

    pub(crate) fn to_reqwest(&self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    data,
                } => {
                    let mut file = reqwest::multipart::Part::bytes(data.to_vec())
                        .file_name(file_name.clone());
                    if let Some(mime) = mime.as_deref() {
                        file = file.mime_str(mime)?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

impl RequestDescriptor {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            payload: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    #[must_use]
    pub fn json_value(mut self, value: Value) -> Self {
        self.payload = Some(Payload::Json(value));
        self
    }

    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(value).map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        Ok(self.json_value(value))
    }

    #[must_use]
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.payload = Some(Payload::Multipart(form));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}
