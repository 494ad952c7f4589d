#![warn(missing_docs)]
//! HTTP functions on top of `userfn_runtime`.
//!
//! API Gateway (REST and HTTP API) and ALB events are presented to handlers
//! as plain `http::Request<Body>` values; handler results are turned back
//! into the response shape the event origin expects.
//!
//! ```rust,no_run
//! use userfn_http::{handler, runtime::{self, Context, Error}, IntoResponse, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     runtime::run(handler(hello)).await
//! }
//!
//! async fn hello(_: Request, _: Context) -> Result<impl IntoResponse, Error> {
//!     Ok("hello")
//! }
//! ```
pub use aws_lambda_events::encodings::Body;
pub use http::{self, Response, StatusCode};
pub use userfn_runtime::{self as runtime, Context};

pub mod ext;
pub mod request;
mod response;

pub use crate::{
    ext::{PayloadError, RequestExt},
    response::{json, text, IntoResponse, APPLICATION_JSON, TEXT_PLAIN},
};
use crate::{request::LambdaRequest, request::RequestOrigin, response::LambdaResponse};
use std::{
    future::Future,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

/// Type alias for `http::Request`s with a fixed body type
pub type Request = http::Request<Body>;

/// Functions serving HTTP requests
pub trait Handler: Sized {
    /// The type of Error that this Handler will return
    type Error;
    /// The type of Response this Handler will return
    type Response: IntoResponse;
    /// The type of Future this Handler will return
    type Fut: Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
    /// Function used to execute handler behavior
    fn call(&mut self, event: Request, context: Context) -> Self::Fut;
}

/// Adapts a [`Handler`] to the `userfn_runtime::run` interface
pub fn handler<H: Handler>(handler: H) -> Adapter<H> {
    Adapter { handler }
}

/// An implementation of `Handler` for a given closure return a `Future` representing the computed response
impl<F, R, Fut, E> Handler for F
where
    F: FnMut(Request, Context) -> Fut,
    R: IntoResponse,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    type Response = R;
    type Error = E;
    type Fut = Fut;
    fn call(&mut self, event: Request, context: Context) -> Self::Fut {
        (self)(event, context)
    }
}

#[doc(hidden)]
pub struct TransformResponse<R, E> {
    request_origin: RequestOrigin,
    fut: Pin<Box<dyn Future<Output = Result<R, E>> + Send>>,
}

impl<R, E> Future for TransformResponse<R, E>
where
    R: IntoResponse,
{
    type Output = Result<LambdaResponse, E>;
    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let origin = self.request_origin;
        match self.fut.as_mut().poll(cx) {
            Poll::Ready(result) => Poll::Ready(
                result.map(|resp| LambdaResponse::from_response(&origin, resp.into_response())),
            ),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Exists only to satisfy the trait cover rule for the `runtime::Handler` impl
///
/// User code should never need to interact with this type directly. Since `Adapter` implements `Handler`
/// It serves as an opaque trait covering type.
///
/// See [this explanation](https://doc.rust-lang.org/error-index.html#E0210)
/// for more information on why this is needed
pub struct Adapter<H: Handler> {
    handler: H,
}

impl<H: Handler> runtime::Handler<LambdaRequest, LambdaResponse> for Adapter<H> {
    type Error = H::Error;
    type Fut = TransformResponse<H::Response, Self::Error>;
    fn call(&mut self, event: LambdaRequest, context: Context) -> Self::Fut {
        let request_origin = event.request_origin();
        let fut = Box::pin(self.handler.call(event.into(), context));
        TransformResponse { request_origin, fut }
    }
}
