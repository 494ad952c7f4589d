use crate::Error;
use http::{uri::PathAndQuery, Request, Response, Uri};
use hyper::{client::HttpConnector, Body};

/// HTTP client for the runtime API. Requests are built with origin-less
/// URIs and get the configured endpoint spliced in before being sent.
#[derive(Debug, Clone)]
pub(crate) struct Client {
    base: Uri,
    client: hyper::Client<HttpConnector>,
}

impl Client {
    pub(crate) fn new(base: Uri) -> Self {
        Client {
            base,
            client: hyper::Client::new(),
        }
    }

    pub(crate) async fn call(&self, req: Request<Body>) -> Result<Response<Body>, Error> {
        let req = self.set_origin(req)?;
        let res = self.client.request(req).await?;
        if res.status().is_server_error() {
            return Err(format!("runtime API answered {}", res.status()).into());
        }
        Ok(res)
    }

    fn set_origin(&self, req: Request<Body>) -> Result<Request<Body>, Error> {
        let (mut parts, body) = req.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        let authority = self.base.authority().ok_or("runtime endpoint has no authority")?;
        parts.uri = Uri::builder()
            .scheme(self.base.scheme_str().unwrap_or("http"))
            .authority(authority.as_str())
            .path_and_query(path.as_str())
            .build()?;
        Ok(Request::from_parts(parts, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splices_endpoint_into_relative_uri() {
        let client = Client::new(Uri::from_static("http://127.0.0.1:9001"));
        let req = Request::get("/2018-06-01/runtime/invocation/next")
            .body(Body::empty())
            .expect("valid request");
        let req = client.set_origin(req).expect("origin set");
        assert_eq!(
            req.uri().to_string(),
            "http://127.0.0.1:9001/2018-06-01/runtime/invocation/next"
        );
    }
}
