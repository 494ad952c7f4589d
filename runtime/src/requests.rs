use crate::{types::Diagnostic, Error};
use http::{Method, Request, Uri};
use hyper::Body;
use serde::Serialize;

const USER_AGENT: &str = concat!("userfn-runtime/", env!("CARGO_PKG_VERSION"));

pub(crate) trait IntoRequest {
    fn into_req(self) -> Result<Request<Body>, Error>;
}

// GET /2018-06-01/runtime/invocation/next
#[derive(Debug, Clone, Copy)]
pub(crate) struct NextEventRequest;

impl IntoRequest for NextEventRequest {
    fn into_req(self) -> Result<Request<Body>, Error> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(Uri::from_static("/2018-06-01/runtime/invocation/next"))
            .header("user-agent", USER_AGENT)
            .body(Body::empty())?;
        Ok(req)
    }
}

// POST /2018-06-01/runtime/invocation/{AwsRequestId}/response
pub(crate) struct EventCompletionRequest<'a, T> {
    pub(crate) request_id: &'a str,
    pub(crate) body: T,
}

impl<'a, T> IntoRequest for EventCompletionRequest<'a, T>
where
    T: Serialize,
{
    fn into_req(self) -> Result<Request<Body>, Error> {
        let uri = format!("/2018-06-01/runtime/invocation/{}/response", self.request_id);
        let body = serde_json::to_vec(&self.body)?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .header("user-agent", USER_AGENT)
            .body(Body::from(body))?;
        Ok(req)
    }
}

// POST /2018-06-01/runtime/invocation/{AwsRequestId}/error
pub(crate) struct EventErrorRequest<'a> {
    pub(crate) request_id: &'a str,
    pub(crate) diagnostic: Diagnostic,
}

impl<'a> IntoRequest for EventErrorRequest<'a> {
    fn into_req(self) -> Result<Request<Body>, Error> {
        let uri = format!("/2018-06-01/runtime/invocation/{}/error", self.request_id);
        error_request(uri, &self.diagnostic)
    }
}

// POST /2018-06-01/runtime/init/error
pub(crate) struct InitErrorRequest {
    pub(crate) diagnostic: Diagnostic,
}

impl IntoRequest for InitErrorRequest {
    fn into_req(self) -> Result<Request<Body>, Error> {
        error_request("/2018-06-01/runtime/init/error".to_owned(), &self.diagnostic)
    }
}

fn error_request(uri: String, diagnostic: &Diagnostic) -> Result<Request<Body>, Error> {
    let body = serde_json::to_vec(diagnostic)?;
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("lambda-runtime-function-error-type", "Unhandled")
        .header("user-agent", USER_AGENT)
        .body(Body::from(body))?;
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn body_json(req: Request<Body>) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(req.into_body()).await.expect("readable body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn next_event_request() {
        let req = NextEventRequest.into_req().expect("valid request");
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.uri(), &Uri::from_static("/2018-06-01/runtime/invocation/next"));
        assert!(req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ua| ua.starts_with("userfn-runtime/")));
    }

    #[tokio::test]
    async fn event_completion_request() {
        let req = EventCompletionRequest {
            request_id: "id",
            body: json!({"success": true}),
        }
        .into_req()
        .expect("valid request");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), &Uri::from_static("/2018-06-01/runtime/invocation/id/response"));
        assert_eq!(body_json(req).await, json!({"success": true}));
    }

    #[tokio::test]
    async fn event_error_request() {
        let req = EventErrorRequest {
            request_id: "id",
            diagnostic: Diagnostic {
                error_type: "InvalidEventDataError".into(),
                error_message: "Error parsing event data".into(),
            },
        }
        .into_req()
        .expect("valid request");
        assert_eq!(req.uri(), &Uri::from_static("/2018-06-01/runtime/invocation/id/error"));
        assert_eq!(
            req.headers().get("lambda-runtime-function-error-type").map(|v| v.as_bytes()),
            Some(&b"Unhandled"[..])
        );
        assert_eq!(
            body_json(req).await,
            json!({"errorType": "InvalidEventDataError", "errorMessage": "Error parsing event data"})
        );
    }

    #[test]
    fn init_error_request() {
        let req = InitErrorRequest {
            diagnostic: Diagnostic {
                error_type: "ConfigError".into(),
                error_message: "missing project id".into(),
            },
        }
        .into_req()
        .expect("valid request");
        assert_eq!(req.uri(), &Uri::from_static("/2018-06-01/runtime/init/error"));
    }
}
