//! HTTP functions that reflect a greeting or the received body.
use serde_json::{json, Value};
use tracing::{info, warn};
use userfn_http::{
    ext::{body_bytes, form_fields, is_json},
    http::Method,
    runtime::Error,
    text, Body, Context, PayloadError, Request, RequestExt, Response, StatusCode,
};

pub const METHOD_NOT_ALLOWED: &str = "Method Not Allowed";
pub const BAD_REQUEST: &str = "Bad Request";
pub const GET_GREETING: &str = "Hello! This is a GET request.";

/// Answers GET requests with a fixed greeting.
pub async fn get_data(req: Request, _: Context) -> Result<Response<Body>, Error> {
    Ok(respond_to_get(&req))
}

/// Answers POST requests with the serialized body they carried.
pub async fn post_data(req: Request, _: Context) -> Result<Response<Body>, Error> {
    Ok(respond_to_post(&req))
}

pub fn respond_to_get(req: &Request) -> Response<Body> {
    if req.method() != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED);
    }
    text(StatusCode::OK, GET_GREETING)
}

pub fn respond_to_post(req: &Request) -> Response<Body> {
    if req.method() != Method::POST {
        return text(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED);
    }

    let data = match received_body(req) {
        Ok(data) => data,
        Err(err) => {
            warn!(error = %err, "rejecting unparseable POST body");
            return text(StatusCode::BAD_REQUEST, BAD_REQUEST);
        }
    };
    info!(data = %data, "Received POST data:");
    text(StatusCode::OK, format!("Hello! Sending: {}.", data))
}

/// The request body as a JSON value.
///
/// JSON bodies are parsed and form bodies become an object, with repeated
/// fields collected into arrays. Text bodies become a string and
/// `application/octet-stream` bodies the `{"type":"Buffer","data":[..]}`
/// form. Empty bodies and other content types yield `{}`.
pub fn received_body(req: &Request) -> Result<Value, PayloadError> {
    let bytes = body_bytes(req.body());
    if bytes.is_empty() {
        return Ok(json!({}));
    }
    let value = match req.media_type().as_deref() {
        Some(mt) if is_json(mt) => req.payload::<Value>()?.unwrap_or_else(|| json!({})),
        Some("application/x-www-form-urlencoded") => Value::Object(form_fields(bytes)?),
        Some(mt) if mt.starts_with("text/") => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        Some("application/octet-stream") => json!({ "type": "Buffer", "data": bytes }),
        _ => json!({}),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use userfn_http::{handler, runtime::simulated};

    fn request(method: Method, content_type: Option<&str>, body: Body) -> Request {
        let mut builder = userfn_http::http::Request::builder().method(method);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(body).expect("failed to build request")
    }

    fn assert_text(res: &Response<Body>, status: StatusCode, expected: &str) {
        assert_eq!(res.status(), status);
        assert_eq!(
            res.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some(userfn_http::TEXT_PLAIN)
        );
        match res.body() {
            Body::Text(text) => assert_eq!(text, expected),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn get_greets() {
        let res = respond_to_get(&request(Method::GET, None, Body::Empty));
        assert_text(&res, StatusCode::OK, "Hello! This is a GET request.");
    }

    #[test]
    fn get_rejects_other_methods() {
        for method in vec![Method::POST, Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
            let res = respond_to_get(&request(method, None, Body::Empty));
            assert_text(&res, StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }
    }

    #[test]
    fn post_echoes_json() {
        let res = respond_to_post(&request(
            Method::POST,
            Some("application/json"),
            Body::from(r#"{"a": 1}"#),
        ));
        assert_text(&res, StatusCode::OK, r#"Hello! Sending: {"a":1}."#);
    }

    #[test]
    fn post_rejects_other_methods() {
        for method in vec![Method::GET, Method::PUT, Method::DELETE, Method::OPTIONS] {
            let res = respond_to_post(&request(method, Some("application/json"), Body::from("{}")));
            assert_text(&res, StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }
    }

    #[test]
    fn post_rejects_malformed_json() {
        let res = respond_to_post(&request(Method::POST, Some("application/json"), Body::from("{")));
        assert_text(&res, StatusCode::BAD_REQUEST, "Bad Request");
    }

    #[test]
    fn body_forms() {
        let body = |content_type: Option<&'static str>, body: Body| {
            received_body(&request(Method::POST, content_type, body)).expect("body parses")
        };
        assert_eq!(body(None, Body::Empty), json!({}));
        assert_eq!(body(Some("text/plain"), Body::from("hi")), json!("hi"));
        assert_eq!(
            body(Some("application/x-www-form-urlencoded"), Body::from("a=1&b=two")),
            json!({"a": "1", "b": "two"})
        );
        assert_eq!(
            body(Some("application/x-www-form-urlencoded"), Body::from("a=1&a=2")),
            json!({"a": ["1", "2"]})
        );
        assert_eq!(
            body(Some("application/octet-stream"), Body::Binary(vec![1, 2])),
            json!({"type": "Buffer", "data": [1, 2]})
        );
        assert_eq!(body(Some("image/png"), Body::Binary(vec![1])), json!({}));
    }

    fn http_api_event(method: &str, content_type: &str, body: &str) -> Value {
        json!({
            "version": "2.0",
            "rawPath": "/data",
            "headers": { "content-type": content_type },
            "requestContext": {
                "http": { "method": method, "path": "/data" },
                "timeEpoch": 0
            },
            "body": body,
            "isBase64Encoded": false
        })
    }

    fn alb_event(method: &str) -> Value {
        json!({
            "requestContext": {
                "elb": { "targetGroupArn": "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/fn/abc" }
            },
            "httpMethod": method,
            "path": "/data",
            "headers": {},
            "body": "",
            "isBase64Encoded": false
        })
    }

    fn responses(outcomes: Vec<simulated::Outcome>) -> Vec<Value> {
        outcomes
            .into_iter()
            .map(|outcome| match outcome {
                simulated::Outcome::Response(res) => res,
                simulated::Outcome::Error(diagnostic) => panic!("invocation failed: {:?}", diagnostic),
            })
            .collect()
    }

    #[tokio::test]
    async fn post_data_through_the_runtime() {
        let outcomes = simulated::invoke(
            handler(post_data),
            vec![http_api_event("POST", "application/json", r#"{"a":1}"#), alb_event("GET")],
        )
        .await
        .expect("runtime completes");

        let responses = responses(outcomes);
        assert_eq!(responses[0]["statusCode"], 200);
        assert_eq!(responses[0]["body"], r#"Hello! Sending: {"a":1}."#);
        assert!(responses[0].get("statusDescription").is_none());

        assert_eq!(responses[1]["statusCode"], 405);
        assert_eq!(responses[1]["statusDescription"], "405 Method Not Allowed");
        assert_eq!(responses[1]["body"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn get_data_through_the_runtime() {
        let outcomes = simulated::invoke(
            handler(get_data),
            vec![alb_event("GET"), http_api_event("DELETE", "text/plain", "")],
        )
        .await
        .expect("runtime completes");

        let responses = responses(outcomes);
        assert_eq!(responses[0]["statusCode"], 200);
        assert_eq!(responses[0]["statusDescription"], "200 OK");
        assert_eq!(responses[0]["body"], "Hello! This is a GET request.");
        assert_eq!(responses[1]["statusCode"], 405);
        assert_eq!(responses[1]["body"], "Method Not Allowed");
    }
}
