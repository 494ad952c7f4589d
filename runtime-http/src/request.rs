//! ALB and API Gateway request adaptations
//!
//! Every supported event shape is folded into an `http::Request<Body>`; the
//! original request context stays reachable through
//! [`RequestExt::request_context`](../trait.RequestExt.html#tymethod.request_context).
use aws_lambda_events::encodings::Body;
use aws_lambda_events::event::alb::{AlbTargetGroupRequest, AlbTargetGroupRequestContext};
use aws_lambda_events::event::apigw::{
    ApiGatewayProxyRequest, ApiGatewayProxyRequestContext, ApiGatewayV2httpRequest, ApiGatewayV2httpRequestContext,
};
use http::{
    header::{HeaderName, HeaderValue, COOKIE, HOST},
    HeaderMap, Method, Uri,
};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::{error::Error as JsonError, Value};

/// Internal representation of an HTTP event from ALB, API Gateway REST
/// and HTTP API proxy integrations.
///
/// The variant is picked from the event's markers (see
/// [`RequestOrigin::of_event`]) rather than by trying each shape in turn,
/// since the shapes share most of their optional fields.
#[doc(hidden)]
#[derive(Debug)]
pub enum LambdaRequest {
    ApiGatewayV1(ApiGatewayProxyRequest),
    ApiGatewayV2(ApiGatewayV2httpRequest),
    Alb(AlbTargetGroupRequest),
}

impl LambdaRequest {
    /// The origin of the event, which decides the shape of the response.
    pub fn request_origin(&self) -> RequestOrigin {
        match self {
            LambdaRequest::ApiGatewayV1 { .. } => RequestOrigin::ApiGatewayV1,
            LambdaRequest::ApiGatewayV2 { .. } => RequestOrigin::ApiGatewayV2,
            LambdaRequest::Alb { .. } => RequestOrigin::Alb,
        }
    }
}

impl<'de> Deserialize<'de> for LambdaRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let event = Value::deserialize(deserializer)?;
        let request = match RequestOrigin::of_event(&event) {
            RequestOrigin::Alb => serde_json::from_value(event).map(LambdaRequest::Alb),
            RequestOrigin::ApiGatewayV2 => serde_json::from_value(event).map(LambdaRequest::ApiGatewayV2),
            RequestOrigin::ApiGatewayV1 => serde_json::from_value(event).map(LambdaRequest::ApiGatewayV1),
        };
        request.map_err(D::Error::custom)
    }
}

/// Represents the origin from which the event was sent.
#[doc(hidden)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestOrigin {
    /// API Gateway REST proxy
    ApiGatewayV1,
    /// API Gateway HTTP API
    ApiGatewayV2,
    /// Application load balancer
    Alb,
}

impl RequestOrigin {
    /// Classifies a raw event: ALB events carry `requestContext.elb`,
    /// HTTP API events declare `"version": "2.0"`, anything else is a REST
    /// proxy event.
    pub fn of_event(event: &Value) -> Self {
        if event.pointer("/requestContext/elb").is_some() {
            RequestOrigin::Alb
        } else if event.get("version").and_then(Value::as_str) == Some("2.0") {
            RequestOrigin::ApiGatewayV2
        } else {
            RequestOrigin::ApiGatewayV1
        }
    }
}

/// Event request context for each supported origin
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum RequestContext {
    /// API Gateway REST proxy request context
    ApiGatewayV1(ApiGatewayProxyRequestContext),
    /// API Gateway HTTP API request context
    ApiGatewayV2(ApiGatewayV2httpRequestContext),
    /// ALB request context
    Alb(AlbTargetGroupRequestContext),
}

/// The pieces every event shape has in some form.
struct Parts {
    method: Method,
    headers: HeaderMap,
    fallback_host: Option<String>,
    path: Option<String>,
    query: Option<String>,
    body: Option<String>,
    base64: bool,
    context: RequestContext,
}

impl From<LambdaRequest> for http::Request<Body> {
    fn from(value: LambdaRequest) -> Self {
        let parts = match value {
            LambdaRequest::ApiGatewayV2(ag) => {
                let mut headers = ag.headers;
                if let Some(cookies) = ag.cookies {
                    if let Ok(value) = HeaderValue::from_str(&cookies.join(";")) {
                        headers.append(COOKIE, value);
                    }
                }
                Parts {
                    method: ag.request_context.http.method.clone(),
                    headers,
                    fallback_host: ag.request_context.domain_name.clone(),
                    path: ag.raw_path,
                    query: ag.raw_query_string.filter(|q| !q.is_empty()),
                    body: ag.body,
                    base64: ag.is_base64_encoded,
                    context: RequestContext::ApiGatewayV2(ag.request_context),
                }
            }
            LambdaRequest::ApiGatewayV1(ag) => Parts {
                method: ag.http_method,
                headers: merge_headers(ag.multi_value_headers, ag.headers),
                fallback_host: None,
                path: ag.path,
                query: None,
                body: ag.body,
                base64: ag.is_base64_encoded.unwrap_or_default(),
                context: RequestContext::ApiGatewayV1(ag.request_context),
            },
            LambdaRequest::Alb(alb) => Parts {
                method: alb.http_method,
                headers: merge_headers(alb.multi_value_headers, alb.headers),
                fallback_host: None,
                path: alb.path,
                query: None,
                body: alb.body,
                base64: alb.is_base64_encoded,
                context: RequestContext::Alb(alb.request_context),
            },
        };
        into_request(parts)
    }
}

// multi-value headers are the canonical source; single-valued ones only fill gaps
fn merge_headers(mut multi: HeaderMap, single: HeaderMap) -> HeaderMap {
    for (name, value) in single.iter() {
        if !multi.contains_key(name) {
            multi.insert(name.clone(), value.clone());
        }
    }
    multi
}

fn into_request(parts: Parts) -> http::Request<Body> {
    let uri = {
        let scheme = parts
            .headers
            .get(x_forwarded_proto())
            .and_then(|s| s.to_str().ok())
            .unwrap_or("https");
        let host = parts
            .headers
            .get(HOST)
            .and_then(|s| s.to_str().ok())
            .or_else(|| parts.fallback_host.as_deref())
            .unwrap_or("localhost");
        let mut url = format!("{}://{}{}", scheme, host, parts.path.as_deref().unwrap_or_default());
        if let Some(query) = &parts.query {
            url.push('?');
            url.push_str(query);
        }
        url.parse::<Uri>().unwrap_or_default()
    };

    let body = parts
        .body
        .as_deref()
        .map_or_else(Body::default, |b| Body::from_maybe_encoded(parts.base64, b));

    let mut req = http::Request::new(body);
    *req.method_mut() = parts.method;
    *req.uri_mut() = uri;
    *req.headers_mut() = parts.headers;
    req.extensions_mut().insert(parts.context);
    req
}

/// Deserializes a `Request` from a string of JSON text.
///
/// # Example
///
/// ```rust,no_run
/// use userfn_http::request::from_str;
/// use std::error::Error;
///
/// fn main() -> Result<(), Box<dyn Error>> {
///     let request = from_str(
///         r#"{ ...raw json here... }"#
///     )?;
///     Ok(println!("{:#?}", request))
/// }
/// ```
pub fn from_str(s: &str) -> Result<crate::Request, JsonError> {
    serde_json::from_str(s).map(LambdaRequest::into)
}

fn x_forwarded_proto() -> HeaderName {
    HeaderName::from_static("x-forwarded-proto")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestExt;

    const API_GATEWAY_V2: &str = r#"{
        "version": "2.0",
        "routeKey": "$default",
        "rawPath": "/post-data",
        "rawQueryString": "debug=1",
        "cookies": ["a=1", "b=2"],
        "headers": {
            "content-type": "application/json",
            "host": "fn.example.com"
        },
        "requestContext": {
            "accountId": "123456789012",
            "apiId": "api-id",
            "domainName": "id.execute-api.us-east-1.amazonaws.com",
            "domainPrefix": "id",
            "http": {
                "method": "POST",
                "path": "/post-data",
                "protocol": "HTTP/1.1",
                "sourceIp": "127.0.0.1",
                "userAgent": "agent"
            },
            "requestId": "id",
            "routeKey": "$default",
            "stage": "$default",
            "time": "12/Mar/2020:19:03:58 +0000",
            "timeEpoch": 1583348638390
        },
        "body": "{\"a\":1}",
        "isBase64Encoded": false
    }"#;

    const API_GATEWAY_V1: &str = r#"{
        "resource": "/post-data",
        "path": "/post-data",
        "httpMethod": "POST",
        "headers": {
            "content-type": "application/x-www-form-urlencoded",
            "host": "rest.example.com",
            "x-tag": "b"
        },
        "multiValueHeaders": {
            "content-type": ["application/x-www-form-urlencoded"],
            "host": ["rest.example.com"],
            "x-tag": ["a", "b"]
        },
        "queryStringParameters": null,
        "multiValueQueryStringParameters": null,
        "pathParameters": null,
        "stageVariables": null,
        "requestContext": {
            "accountId": "123456789012",
            "resourceId": "abc123",
            "stage": "prod",
            "requestId": "c6af9ac6-7b61-11e6-9a41-93e8deadbeef",
            "requestTime": "09/Apr/2015:12:34:56 +0000",
            "requestTimeEpoch": 1428582896000,
            "identity": {
                "cognitoIdentityPoolId": null,
                "accountId": null,
                "cognitoIdentityId": null,
                "caller": null,
                "accessKey": null,
                "sourceIp": "127.0.0.1",
                "cognitoAuthenticationType": null,
                "cognitoAuthenticationProvider": null,
                "userArn": null,
                "userAgent": "agent",
                "user": null
            },
            "path": "/prod/post-data",
            "resourcePath": "/post-data",
            "httpMethod": "POST",
            "apiId": "1234567890",
            "protocol": "HTTP/1.1"
        },
        "body": "a=1",
        "isBase64Encoded": false
    }"#;

    const ALB: &str = r#"{
        "requestContext": {
            "elb": {
                "targetGroupArn": "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/lambda/abc"
            }
        },
        "httpMethod": "GET",
        "path": "/get-data",
        "queryStringParameters": {},
        "headers": {
            "host": "lb.example.com",
            "x-forwarded-proto": "http"
        },
        "body": "",
        "isBase64Encoded": false
    }"#;

    #[test]
    fn api_gateway_v2_request() {
        let req = from_str(API_GATEWAY_V2).expect("failed to parse request");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), "https://fn.example.com/post-data?debug=1");
        assert_eq!(
            req.headers().get(COOKIE).and_then(|v| v.to_str().ok()),
            Some("a=1;b=2")
        );
        match req.body() {
            Body::Text(text) => assert_eq!(text, r#"{"a":1}"#),
            other => panic!("unexpected body {:?}", other),
        }
        assert!(matches!(req.request_context(), Some(RequestContext::ApiGatewayV2(_))));
    }

    #[test]
    fn alb_request() {
        let req = from_str(ALB).expect("failed to parse request");
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.uri(), "http://lb.example.com/get-data");
        assert!(matches!(req.request_context(), Some(RequestContext::Alb(_))));
    }

    #[test]
    fn api_gateway_v1_request() {
        let req = from_str(API_GATEWAY_V1).expect("failed to parse request");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), "https://rest.example.com/post-data");
        assert_eq!(
            req.headers().get_all("x-tag").iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        match req.body() {
            Body::Text(text) => assert_eq!(text, "a=1"),
            other => panic!("unexpected body {:?}", other),
        }
        assert!(matches!(req.request_context(), Some(RequestContext::ApiGatewayV1(_))));
    }

    #[test]
    fn request_origin_follows_event_shape() {
        for (event, origin) in vec![
            (API_GATEWAY_V1, RequestOrigin::ApiGatewayV1),
            (API_GATEWAY_V2, RequestOrigin::ApiGatewayV2),
            (ALB, RequestOrigin::Alb),
        ] {
            let request: LambdaRequest = serde_json::from_str(event).expect("failed to parse request");
            assert_eq!(request.request_origin(), origin);
        }
    }

    #[test]
    fn malformed_events_are_rejected() {
        let err = serde_json::from_str::<LambdaRequest>(r#"{"version":"2.0","rawPath":5}"#)
            .expect_err("rawPath is not a string");
        assert!(err.is_data());
    }
}
