//! The callable function protocol.
//!
//! Callers POST `{"data": ...}` as JSON. Success is answered with
//! `{"result": ...}` and status 200, failures with
//! `{"error": {"status": "...", "message": "..."}}` and the status the
//! error code maps to.
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::warn;
use userfn_http::{ext::is_json, http::Method, Body, Request, RequestExt, Response, StatusCode};

/// Canonical error codes a callable function may fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionsErrorCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl FunctionsErrorCode {
    /// The code as callers spell it, e.g. `invalid-argument`.
    pub fn as_str(self) -> &'static str {
        use FunctionsErrorCode::*;
        match self {
            Ok => "ok",
            Cancelled => "cancelled",
            Unknown => "unknown",
            InvalidArgument => "invalid-argument",
            DeadlineExceeded => "deadline-exceeded",
            NotFound => "not-found",
            AlreadyExists => "already-exists",
            PermissionDenied => "permission-denied",
            ResourceExhausted => "resource-exhausted",
            FailedPrecondition => "failed-precondition",
            Aborted => "aborted",
            OutOfRange => "out-of-range",
            Unimplemented => "unimplemented",
            Internal => "internal",
            Unavailable => "unavailable",
            DataLoss => "data-loss",
            Unauthenticated => "unauthenticated",
        }
    }

    /// The status name carried in error bodies, e.g. `INVALID_ARGUMENT`.
    pub fn canonical_status(self) -> &'static str {
        use FunctionsErrorCode::*;
        match self {
            Ok => "OK",
            Cancelled => "CANCELLED",
            Unknown => "UNKNOWN",
            InvalidArgument => "INVALID_ARGUMENT",
            DeadlineExceeded => "DEADLINE_EXCEEDED",
            NotFound => "NOT_FOUND",
            AlreadyExists => "ALREADY_EXISTS",
            PermissionDenied => "PERMISSION_DENIED",
            ResourceExhausted => "RESOURCE_EXHAUSTED",
            FailedPrecondition => "FAILED_PRECONDITION",
            Aborted => "ABORTED",
            OutOfRange => "OUT_OF_RANGE",
            Unimplemented => "UNIMPLEMENTED",
            Internal => "INTERNAL",
            Unavailable => "UNAVAILABLE",
            DataLoss => "DATA_LOSS",
            Unauthenticated => "UNAUTHENTICATED",
        }
    }

    pub fn http_status(self) -> StatusCode {
        use FunctionsErrorCode::*;
        match self {
            Ok => StatusCode::OK,
            Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Unknown | Internal | DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
            InvalidArgument | FailedPrecondition | OutOfRange => StatusCode::BAD_REQUEST,
            DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            NotFound => StatusCode::NOT_FOUND,
            AlreadyExists | Aborted => StatusCode::CONFLICT,
            PermissionDenied => StatusCode::FORBIDDEN,
            ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for FunctionsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error a callable function reports to its caller.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct HttpsError {
    pub code: FunctionsErrorCode,
    pub message: String,
}

impl HttpsError {
    pub fn new(code: FunctionsErrorCode, message: impl Into<String>) -> Self {
        HttpsError {
            code,
            message: message.into(),
        }
    }

    fn bad_request() -> Self {
        HttpsError::new(FunctionsErrorCode::InvalidArgument, "Bad Request")
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "status": self.code.canonical_status(),
                "message": self.message,
            }
        })
    }
}

/// Validates a callable request and extracts its `data` value.
pub fn decode(req: &Request) -> Result<Value, HttpsError> {
    if req.method() != Method::POST {
        warn!(method = %req.method(), "callable request must use POST");
        return Err(HttpsError::bad_request());
    }
    if !req.media_type().as_deref().map_or(false, is_json) {
        warn!("callable request must carry application/json");
        return Err(HttpsError::bad_request());
    }
    let mut body: Map<String, Value> = match req.payload() {
        Ok(Some(body)) => body,
        Ok(None) => {
            warn!("callable request body is missing");
            return Err(HttpsError::bad_request());
        }
        Err(err) => {
            warn!(error = %err, "callable request body is not a JSON object");
            return Err(HttpsError::bad_request());
        }
    };
    let data = match body.remove("data") {
        Some(data) => data,
        None => {
            warn!("callable request body is missing data field");
            return Err(HttpsError::bad_request());
        }
    };
    if !body.is_empty() {
        let extra: Vec<&String> = body.keys().collect();
        warn!(fields = ?extra, "callable request body has invalid fields");
        return Err(HttpsError::bad_request());
    }
    Ok(data)
}

/// Encodes the outcome of a callable function as an HTTP response.
pub fn encode<T>(outcome: Result<T, HttpsError>) -> Response<Body>
where
    T: Serialize,
{
    let outcome = outcome.and_then(|result| {
        serde_json::to_value(result)
            .map_err(|_| HttpsError::new(FunctionsErrorCode::Internal, "Failed to encode result."))
    });
    match outcome {
        Ok(result) => userfn_http::json(StatusCode::OK, &json!({ "result": result })),
        Err(err) => userfn_http::json(err.code.http_status(), &err.to_json()),
    }
}
