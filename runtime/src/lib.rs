#![deny(missing_docs)]
//! Runtime for serverless functions.
//!
//! A function is any type implementing [`Handler`]; the usual way to get one
//! is wrapping an async function with [`handler_fn`]. [`run`] then polls the
//! runtime API for invocations, one at a time, until the process is stopped.
//!
//! ```no_run
//! use userfn_runtime::{handler_fn, Context, Error};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     userfn_runtime::run(handler_fn(func)).await
//! }
//!
//! async fn func(event: Value, _: Context) -> Result<Value, Error> {
//!     Ok(event)
//! }
//! ```
use futures_core::Stream;
use futures_util::{pin_mut, stream::StreamExt};
use http::Uri;
use serde::{de::DeserializeOwned, Serialize};
use std::{convert::TryFrom, fmt, future::Future};
use tracing::{error, info_span, trace};
use tracing_futures::Instrument;

mod client;
mod requests;
#[cfg(feature = "simulated")]
pub mod simulated;
mod types;

use client::Client;
use requests::{EventCompletionRequest, EventErrorRequest, InitErrorRequest, IntoRequest, NextEventRequest};
pub use types::{Config, Context, Diagnostic};

/// Error type that functions may result in
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A trait describing an asynchronous function `A` to `B`.
pub trait Handler<A, B> {
    /// Errors returned by this handler.
    type Error;
    /// Response of this handler.
    type Fut: Future<Output = Result<B, Self::Error>>;
    /// Handle the incoming event.
    fn call(&mut self, event: A, context: Context) -> Self::Fut;
}

/// Returns a new [`HandlerFn`] with the given closure.
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

/// A [`Handler`] implemented by a closure.
#[derive(Clone, Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, A, B, E, Fut> Handler<A, B> for HandlerFn<F>
where
    F: Fn(A, Context) -> Fut,
    Fut: Future<Output = Result<B, E>>,
    E: fmt::Display,
{
    type Error = E;
    type Fut = Fut;
    fn call(&mut self, req: A, ctx: Context) -> Self::Fut {
        (self.f)(req, ctx)
    }
}

/// Starts the runtime and begins polling for invocations.
///
/// Configuration is read from the environment (see [`Config::from_env`]).
/// Failed invocations are reported to the runtime API and do not stop the
/// loop. Only failures to talk to the runtime API, and events without a
/// request id, are returned.
pub async fn run<A, B, F>(handler: F) -> Result<(), Error>
where
    F: Handler<A, B>,
    F::Error: fmt::Display,
    A: DeserializeOwned,
    B: Serialize,
{
    trace!("loading config from env");
    let config = Config::from_env()?;
    let runtime = Runtime::new(config)?;
    let incoming = incoming(&runtime.client);
    runtime.run(incoming, handler).await
}

/// Reports an error that prevented the function from starting.
///
/// Call this instead of [`run`] when the handler cannot be constructed.
pub async fn report_init_error<E>(err: &E) -> Result<(), Error>
where
    E: fmt::Display + ?Sized,
{
    error!("function initialization failed: {}", err);
    let config = Config::from_env()?;
    let runtime = Runtime::new(config)?;
    let req = InitErrorRequest {
        diagnostic: Diagnostic::from_error(err),
    }
    .into_req()?;
    runtime.client.call(req).await?;
    Ok(())
}

struct Runtime {
    client: Client,
    config: Config,
}

impl Runtime {
    fn new(config: Config) -> Result<Self, Error> {
        let base = format!("http://{}", config.endpoint).parse::<Uri>()?;
        Ok(Runtime {
            client: Client::new(base),
            config,
        })
    }

    async fn run<A, B, F>(
        &self,
        incoming: impl Stream<Item = Result<http::Response<hyper::Body>, Error>>,
        mut handler: F,
    ) -> Result<(), Error>
    where
        F: Handler<A, B>,
        F::Error: fmt::Display,
        A: DeserializeOwned,
        B: Serialize,
    {
        pin_mut!(incoming);
        while let Some(event) = incoming.next().await {
            let (parts, body) = event?.into_parts();
            // without a request id the invocation cannot be answered at all
            let request_id = types::request_id(&parts.headers)?.to_owned();
            let body = hyper::body::to_bytes(body).await?;
            let span = info_span!("invocation", request_id = %request_id);

            let outcome = async {
                match Context::try_from(&parts.headers) {
                    Ok(ctx) => invoke(&mut handler, &body, ctx.with_config(&self.config)).await,
                    Err(err) => Err(err),
                }
            }
            .instrument(span)
            .await;
            let req = match outcome {
                Ok(req) => req,
                Err(err) => {
                    error!(request_id = %request_id, "unable to run invocation: {}", err);
                    EventErrorRequest {
                        request_id: &request_id,
                        diagnostic: Diagnostic::from_error(&err),
                    }
                    .into_req()?
                }
            };
            self.client.call(req).await?;
        }
        Ok(())
    }
}

/// Runs one invocation and builds the request reporting its outcome.
async fn invoke<A, B, F>(handler: &mut F, body: &[u8], ctx: Context) -> Result<http::Request<hyper::Body>, Error>
where
    F: Handler<A, B>,
    F::Error: fmt::Display,
    A: DeserializeOwned,
    B: Serialize,
{
    let request_id = ctx.request_id.clone();
    let mut de = serde_json::Deserializer::from_slice(body);
    let event = match serde_path_to_error::deserialize::<_, A>(&mut de) {
        Ok(event) => event,
        Err(err) => {
            error!(path = %err.path(), "unable to deserialize event: {}", err);
            return EventErrorRequest {
                request_id: &request_id,
                diagnostic: Diagnostic::from_error(&err),
            }
            .into_req();
        }
    };

    trace!("invoking handler");
    match handler.call(event, ctx).await {
        Ok(response) => EventCompletionRequest {
            request_id: &request_id,
            body: response,
        }
        .into_req(),
        Err(err) => {
            error!("handler failed: {}", err);
            EventErrorRequest {
                request_id: &request_id,
                diagnostic: Diagnostic::from_error(&err),
            }
            .into_req()
        }
    }
}

fn incoming(client: &Client) -> impl Stream<Item = Result<http::Response<hyper::Body>, Error>> + '_ {
    async_stream::stream! {
        loop {
            trace!("waiting for next event");
            match NextEventRequest.into_req() {
                Ok(req) => yield client.call(req).await,
                Err(err) => yield Err(err),
            }
        }
    }
}
