//! Decoder for the remote API's `{success, data, error}` JSON envelope.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, CoreError, DecodeError, Result};
use crate::transport::RawResponse;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error_data: Value,
}

/// Media type of the response, lowercased and without parameters.
fn media_type(response: &RawResponse) -> std::result::Result<String, DecodeError> {
    let header = response.content_type().unwrap_or_default();
    let media = header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if media.is_empty() || !media.contains('/') {
        return Err(DecodeError::InvalidContentType(header.to_string()));
    }
    Ok(media)
}

fn is_json_media_type(media: &str) -> bool {
    media == "application/json" || (media.starts_with("application/") && media.ends_with("+json"))
}

/// Whether the response declares a JSON body.
pub fn is_json_response(response: &RawResponse) -> bool {
    media_type(response).is_ok_and(|media| is_json_media_type(&media))
}

/// Decode the `data` field of an enveloped JSON response.
///
/// `success` missing counts as success. A missing or `null` `data` is
/// decoded from JSON `null`, which suits `()`, `Option<_>` and `Value`.
///
/// # Errors
///
/// * [`CoreError::Api`] when the envelope says `success: false`
/// * [`CoreError::UnexpectedStatus`] for non-2xx without such an envelope
/// * [`CoreError::Decode`] for non-JSON content types or malformed bodies
pub fn decode<T: DeserializeOwned>(response: &RawResponse) -> Result<T> {
    if !response.is_success() {
        return Err(status_error(response));
    }

    let media = media_type(response)?;
    if !is_json_media_type(&media) {
        return Err(DecodeError::ContentType(media).into());
    }

    let envelope: Envelope = serde_json::from_slice(&response.body).map_err(DecodeError::Body)?;
    if envelope.success == Some(false) {
        return Err(api_error(envelope.error.unwrap_or_default(), response).into());
    }

    let data = envelope.data.unwrap_or(Value::Null);
    T::deserialize(data)
        .map_err(DecodeError::Body)
        .map_err(CoreError::from)
}

/// Like [`decode`], but accepts an empty 2xx body (e.g. `204 No Content`).
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_empty(response: &RawResponse) -> Result<()> {
    if response.is_success() && response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    decode::<Value>(response).map(|_| ())
}

/// Error for a non-2xx response: the structured envelope error when the body
/// carries one, [`CoreError::UnexpectedStatus`] otherwise.
pub fn status_error(response: &RawResponse) -> CoreError {
    let structured = media_type(response)
        .ok()
        .filter(|media| is_json_media_type(media))
        .and_then(|_| serde_json::from_slice::<Envelope>(&response.body).ok())
        .filter(|envelope| envelope.success == Some(false));

    match structured {
        Some(envelope) => api_error(envelope.error.unwrap_or_default(), response).into(),
        None => CoreError::UnexpectedStatus {
            status: response.status.as_u16(),
            body_len: response.body.len(),
        },
    }
}

fn api_error(error: EnvelopeError, response: &RawResponse) -> ApiError {
    ApiError {
        code: error.code,
        message: error.message,
        field_errors: field_errors(error.error_data),
        status: response.status.as_u16(),
    }
}

/// `error_data` is a map of field name to messages; some endpoints send an
/// empty array instead, or a bare string per field.
fn field_errors(value: Value) -> BTreeMap<String, Vec<String>> {
    let Value::Object(map) = value else {
        return BTreeMap::new();
    };
    map.into_iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                Value::String(s) => vec![s],
                Value::Null => Vec::new(),
                other => vec![other.to_string()],
            };
            (field, messages)
        })
        .collect()
}
