use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Standard server wrapper: `{ "code": .., "message": .., "result": .. }`.
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Value,
}

/// Unwraps a 2xx body into its `result`.
///
/// With `success_code` unset the envelope `code` is not inspected and may be
/// any JSON value. An empty body yields `Value::Null`.
pub fn normalize(body: &[u8], success_code: Option<i64>) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let envelope: ResponseEnvelope =
        serde_json::from_slice(body).map_err(|err| ApiError::Decode(err.to_string()))?;
    let code = envelope.code.filter(|code| !code.is_null());
    if let (Some(expected), Some(code)) = (success_code, code) {
        if code.as_i64() != Some(expected) {
            return Err(ApiError::Domain {
                code,
                message: envelope.message.unwrap_or_default(),
                result: envelope.result,
            });
        }
    }
    Ok(envelope.result)
}

/// Error body for a non-2xx response: JSON when it parses, text otherwise.
pub fn error_data(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
