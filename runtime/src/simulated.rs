//! An in-process stand-in for the runtime API.
//!
//! [`invoke`] serves a fixed list of events to a handler through the real
//! invocation loop and collects what the handler reported for each of them.
use crate::{incoming, Config, Diagnostic, Error, Handler, Runtime};
use futures_util::stream::StreamExt;
use http::{
    header::{HeaderName, HeaderValue},
    Method, Request, Response, StatusCode,
};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Server,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::VecDeque,
    convert::Infallible,
    fmt,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::oneshot;

const INVOCATION_PREFIX: &str = "/2018-06-01/runtime/invocation/";

/// What a handler reported for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The serialized response posted for the invocation.
    Response(Value),
    /// The diagnostic posted when the invocation failed.
    Error(Diagnostic),
}

/// Extra `lambda-runtime-*` headers served along with an event.
type EventHeaders = Vec<(&'static str, &'static str)>;

#[derive(Default)]
struct State {
    pending: VecDeque<(String, Value, EventHeaders)>,
    outcomes: Vec<Outcome>,
}

/// Runs `handler` against `events` and returns one [`Outcome`] per event, in order.
pub async fn invoke<A, B, F>(handler: F, events: Vec<Value>) -> Result<Vec<Outcome>, Error>
where
    F: Handler<A, B>,
    F::Error: fmt::Display,
    A: DeserializeOwned,
    B: Serialize,
{
    invoke_with_headers(handler, events.into_iter().map(|event| (event, Vec::new())).collect()).await
}

async fn invoke_with_headers<A, B, F>(handler: F, events: Vec<(Value, EventHeaders)>) -> Result<Vec<Outcome>, Error>
where
    F: Handler<A, B>,
    F::Error: fmt::Display,
    A: DeserializeOwned,
    B: Serialize,
{
    let count = events.len();
    let state = Arc::new(Mutex::new(State {
        pending: events
            .into_iter()
            .enumerate()
            .map(|(i, (event, headers))| (format!("simulated-{}", i), event, headers))
            .collect(),
        outcomes: Vec::with_capacity(count),
    }));

    let service_state = Arc::clone(&state);
    let make_svc = make_service_fn(move |_conn| {
        let state = Arc::clone(&service_state);
        async move { Ok::<_, Infallible>(service_fn(move |req| serve(req, Arc::clone(&state)))) }
    });
    let server = Server::try_bind(&SocketAddr::from(([127, 0, 0, 1], 0)))?.serve(make_svc);
    let addr = server.local_addr();
    let (shutdown, signal) = oneshot::channel::<()>();
    let server = tokio::spawn(server.with_graceful_shutdown(async move {
        signal.await.ok();
    }));

    let runtime = Runtime::new(Config {
        endpoint: addr.to_string(),
        function_name: "simulated".to_owned(),
        ..Config::default()
    })?;
    let result = runtime.run(incoming(&runtime.client).take(count), handler).await;

    let _ = shutdown.send(());
    server.await??;
    result?;

    let mut state = state.lock().map_err(|_| "simulated runtime state poisoned")?;
    Ok(std::mem::take(&mut state.outcomes))
}

async fn serve(req: Request<Body>, state: Arc<Mutex<State>>) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let route = path.strip_prefix(INVOCATION_PREFIX).unwrap_or_default();

    let res = match (method, route) {
        (Method::GET, "next") => next_event(&state),
        (Method::POST, route) if route.ends_with("/response") => match read_json(req).await {
            Some(body) => record(&state, Outcome::Response(body)),
            None => status(StatusCode::BAD_REQUEST),
        },
        (Method::POST, route) if route.ends_with("/error") => {
            match read_json(req).await.and_then(|v| serde_json::from_value(v).ok()) {
                Some(diagnostic) => record(&state, Outcome::Error(diagnostic)),
                None => status(StatusCode::BAD_REQUEST),
            }
        }
        _ => status(StatusCode::NOT_FOUND),
    };
    Ok(res)
}

fn next_event(state: &Mutex<State>) -> Response<Body> {
    let next = match state.lock() {
        Ok(mut state) => state.pending.pop_front(),
        Err(_) => return status(StatusCode::INTERNAL_SERVER_ERROR),
    };
    let (request_id, event, extra) = match next {
        Some(next) => next,
        None => return status(StatusCode::NOT_FOUND),
    };

    let deadline = SystemTime::now()
        .checked_add(Duration::from_secs(3))
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let mut res = Response::new(Body::from(event.to_string()));
    let headers = res.headers_mut();
    if let Ok(id) = HeaderValue::from_str(&request_id) {
        headers.insert("lambda-runtime-aws-request-id", id);
    }
    if let Ok(deadline) = HeaderValue::from_str(&deadline.to_string()) {
        headers.insert("lambda-runtime-deadline-ms", deadline);
    }
    headers.insert(
        "lambda-runtime-invoked-function-arn",
        HeaderValue::from_static("arn:aws:lambda:us-east-1:000000000000:function:simulated"),
    );
    for (name, value) in extra {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }
    res
}

async fn read_json(req: Request<Body>) -> Option<Value> {
    let bytes = hyper::body::to_bytes(req.into_body()).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn record(state: &Mutex<State>, outcome: Outcome) -> Response<Body> {
    match state.lock() {
        Ok(mut state) => {
            state.outcomes.push(outcome);
            status(StatusCode::ACCEPTED)
        }
        Err(_) => status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn status(code: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = code;
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handler_fn, Context};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Greeting {
        name: String,
    }

    async fn greet(event: Greeting, ctx: Context) -> Result<Value, Error> {
        if event.name.is_empty() {
            return Err("empty name".into());
        }
        Ok(json!({ "message": format!("Hello, {}!", event.name), "requestId": ctx.request_id }))
    }

    #[tokio::test]
    async fn responses_and_errors_are_reported() {
        let outcomes = invoke(
            handler_fn(greet),
            vec![json!({"name": "world"}), json!({"name": ""}), json!({"name": "again"})],
        )
        .await
        .expect("runtime completes");

        assert_eq!(
            outcomes,
            vec![
                Outcome::Response(json!({"message": "Hello, world!", "requestId": "simulated-0"})),
                Outcome::Error(Diagnostic {
                    error_type: std::any::type_name::<Error>().to_owned(),
                    error_message: "empty name".to_owned(),
                }),
                Outcome::Response(json!({"message": "Hello, again!", "requestId": "simulated-2"})),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_context_fails_only_its_invocation() {
        let outcomes = invoke_with_headers(
            handler_fn(greet),
            vec![
                (json!({"name": "first"}), vec![("lambda-runtime-client-context", "{bad")]),
                (json!({"name": "second"}), Vec::new()),
            ],
        )
        .await
        .expect("runtime completes");

        match &outcomes[..] {
            [Outcome::Error(diagnostic), Outcome::Response(res)] => {
                assert!(!diagnostic.error_message.is_empty());
                assert_eq!(res["requestId"], "simulated-1");
            }
            other => panic!("unexpected outcomes {:?}", other),
        }
    }

    #[tokio::test]
    async fn unserializable_responses_are_reported() {
        use std::collections::BTreeMap;

        async fn keyed_by_pair(_: Value, _: Context) -> Result<BTreeMap<(u8, u8), u8>, Error> {
            Ok(vec![((1, 2), 3)].into_iter().collect())
        }

        let outcomes = invoke(handler_fn(keyed_by_pair), vec![json!({}), json!({})])
            .await
            .expect("runtime completes");
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o, Outcome::Error(_))));
    }

    #[tokio::test]
    async fn undeserializable_events_are_reported() {
        let outcomes = invoke(handler_fn(greet), vec![json!({"name": 5})])
            .await
            .expect("runtime completes");
        match &outcomes[..] {
            [Outcome::Error(diagnostic)] => assert!(diagnostic.error_message.starts_with("name:")),
            other => panic!("unexpected outcomes {:?}", other),
        }
    }
}
