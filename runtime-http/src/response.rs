//! Response types

use aws_lambda_events::encodings::Body;
use aws_lambda_events::event::alb::AlbTargetGroupResponse;
use aws_lambda_events::event::apigw::{ApiGatewayProxyResponse, ApiGatewayV2httpResponse};
use http::{
    header::{HeaderValue, CONTENT_TYPE, SET_COOKIE},
    Response, StatusCode,
};
use serde::Serialize;

use crate::request::RequestOrigin;

/// Media type of plain text responses
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Media type of JSON responses
pub const APPLICATION_JSON: &str = "application/json";

/// Representation of an HTTP function response in the shape its origin expects
#[doc(hidden)]
#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum LambdaResponse {
    ApiGatewayV2(ApiGatewayV2httpResponse),
    ApiGatewayV1(ApiGatewayProxyResponse),
    Alb(AlbTargetGroupResponse),
}

impl LambdaResponse {
    pub(crate) fn from_response<T>(request_origin: &RequestOrigin, value: Response<T>) -> Self
    where
        T: Into<Body>,
    {
        let (parts, body) = value.into_parts();
        let (is_base64_encoded, body) = match body.into() {
            Body::Empty => (false, None),
            b @ Body::Text(_) => (false, Some(b)),
            b @ Body::Binary(_) => (true, Some(b)),
        };

        let mut headers = parts.headers;
        let status_code = i64::from(parts.status.as_u16());

        match request_origin {
            RequestOrigin::ApiGatewayV2 => {
                // cookies travel in their own attribute for HTTP APIs
                let cookies = headers
                    .get_all(SET_COOKIE)
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_owned)
                    .collect();
                headers.remove(SET_COOKIE);

                LambdaResponse::ApiGatewayV2(ApiGatewayV2httpResponse {
                    body,
                    status_code,
                    is_base64_encoded: Some(is_base64_encoded),
                    cookies,
                    headers: headers.clone(),
                    multi_value_headers: headers,
                })
            }
            RequestOrigin::ApiGatewayV1 => LambdaResponse::ApiGatewayV1(ApiGatewayProxyResponse {
                body,
                status_code,
                is_base64_encoded: Some(is_base64_encoded),
                headers: headers.clone(),
                multi_value_headers: headers,
            }),
            RequestOrigin::Alb => LambdaResponse::Alb(AlbTargetGroupResponse {
                body,
                status_code,
                is_base64_encoded,
                headers: headers.clone(),
                multi_value_headers: headers,
                status_description: Some(format!(
                    "{} {}",
                    status_code,
                    parts.status.canonical_reason().unwrap_or_default()
                )),
            }),
        }
    }
}

/// A conversion of self into a `Response<Body>`.
///
/// Implementations for `Response<B> where B: Into<Body>`, `String`, `&str`
/// (as `text/plain`) and `serde_json::Value` (as `application/json`) are
/// provided.
pub trait IntoResponse {
    /// Return a translation of `self` into a `Response<Body>`
    fn into_response(self) -> Response<Body>;
}

impl<B> IntoResponse for Response<B>
where
    B: Into<Body>,
{
    fn into_response(self) -> Response<Body> {
        let (parts, body) = self.into_parts();
        Response::from_parts(parts, body.into())
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response<Body> {
        text(StatusCode::OK, self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response<Body> {
        text(StatusCode::OK, self)
    }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response<Body> {
        json(StatusCode::OK, &self)
    }
}

/// A `text/plain` response with the given status.
pub fn text(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    with_content_type(status, TEXT_PLAIN, Body::from(body.into()))
}

/// An `application/json` response with the given status.
pub fn json(status: StatusCode, body: &serde_json::Value) -> Response<Body> {
    with_content_type(status, APPLICATION_JSON, Body::from(body.to_string()))
}

fn with_content_type(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut res = Response::new(body);
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    res
}
