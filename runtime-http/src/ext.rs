//! Extension methods for `http::Request` types

use crate::{request::RequestContext, Body};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{error::Error, fmt};

/// Failure modes for [`RequestExt::payload`]
#[derive(Debug)]
pub enum PayloadError {
    /// Returned when `application/json` bodies fail to deserialize
    Json(serde_json::Error),
    /// Returned when `application/x-www-form-urlencoded` bodies fail to deserialize
    WwwFormUrlEncoded(serde_urlencoded::de::Error),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Json(json) => write!(f, "failed to parse payload from application/json {}", json),
            PayloadError::WwwFormUrlEncoded(form) => write!(
                f,
                "failed to parse payload from application/x-www-form-urlencoded {}",
                form
            ),
        }
    }
}

impl Error for PayloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PayloadError::Json(json) => Some(json),
            PayloadError::WwwFormUrlEncoded(form) => Some(form),
        }
    }
}

/// The media type a request body declares, without parameters.
pub(crate) fn media_type(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
}

/// Returns whether `media_type` names a JSON document.
pub fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Raw bytes of a request body.
pub fn body_bytes(body: &Body) -> &[u8] {
    match body {
        Body::Empty => &[],
        Body::Text(text) => text.as_bytes(),
        Body::Binary(bytes) => bytes,
    }
}

/// Parses a url-encoded form into a JSON object of its fields.
///
/// A field given once maps to its string value; a repeated field maps to
/// the array of its values, in order.
pub fn form_fields(body: &[u8]) -> Result<Map<String, Value>, PayloadError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).map_err(PayloadError::WwwFormUrlEncoded)?;
    let mut fields = Map::new();
    for (name, value) in pairs {
        let value = Value::String(value);
        match fields.get_mut(&name) {
            Some(Value::Array(values)) => values.push(value),
            Some(first) => {
                let first = first.take();
                fields.insert(name, Value::Array(vec![first, value]));
            }
            None => {
                fields.insert(name, value);
            }
        }
    }
    Ok(fields)
}

/// Extensions for HTTP function requests.
pub trait RequestExt {
    /// The context of the event this request was built from, if any.
    fn request_context(&self) -> Option<&RequestContext>;

    /// The `Content-Type` media type, lowercased and without parameters.
    fn media_type(&self) -> Option<String>;

    /// Deserializes the body according to its `Content-Type`.
    ///
    /// JSON and url-encoded form bodies are supported. Requests with an empty
    /// body or any other content type yield `Ok(None)`.
    fn payload<D>(&self) -> Result<Option<D>, PayloadError>
    where
        D: DeserializeOwned;
}

impl RequestExt for http::Request<Body> {
    fn request_context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }

    fn media_type(&self) -> Option<String> {
        media_type(self.headers())
    }

    fn payload<D>(&self) -> Result<Option<D>, PayloadError>
    where
        D: DeserializeOwned,
    {
        let bytes = body_bytes(self.body());
        if bytes.is_empty() {
            return Ok(None);
        }
        match self.media_type().as_deref() {
            Some(mt) if is_json(mt) => serde_json::from_slice(bytes).map(Some).map_err(PayloadError::Json),
            Some("application/x-www-form-urlencoded") => serde_urlencoded::from_bytes(bytes)
                .map(Some)
                .map_err(PayloadError::WwwFormUrlEncoded),
            _ => Ok(None),
        }
    }
}
