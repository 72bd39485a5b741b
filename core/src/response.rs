//! Status checking and error-message extraction shared by the API parsers.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

/// Map a non-2xx response to the matching `ApiError` variant.
///
/// `default_message` is used when the body carries no usable `detail`.
pub(crate) fn check_status(response: &HttpResponse, default_message: &str) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let message = error_detail(&response.body).unwrap_or_else(|| default_message.to_string());
    Err(match response.status {
        401 => ApiError::AuthRejected { message },
        400 | 422 => ApiError::ValidationFailed { message },
        404 => ApiError::NotFound { message },
        status @ 500..=599 => ApiError::ServerError { status, message },
        status => ApiError::HttpError { status, message },
    })
}

/// Extract the server's `detail` from an error body.
///
/// `detail` is either a plain string or a list of `{"msg": ...}` objects
/// (request-validation errors); list messages are joined with "; ".
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match parsed.detail? {
        Value::String(s) => s,
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => other.get("msg").and_then(Value::as_str).map(str::to_string),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => return None,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

pub(crate) fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}
