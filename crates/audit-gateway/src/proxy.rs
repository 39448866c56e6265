use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::{StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

/// Upstream API server every request is forwarded to.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: String,
}

impl Upstream {
    pub fn new(addr: SocketAddr) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            authority: addr.to_string(),
        }
    }

    /// Rewrite an incoming request URI to point at the upstream.
    pub fn target(&self, uri: &Uri) -> Result<Uri, http::Error> {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        Uri::builder()
            .scheme("http")
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()
    }
}

/// A router that forwards every request to `upstream`.
pub fn router(upstream: Upstream) -> Router {
    Router::new().fallback(forward).with_state(upstream)
}

async fn forward(State(upstream): State<Upstream>, mut request: Request) -> Response {
    let target = match upstream.target(request.uri()) {
        Ok(target) => target,
        Err(err) => {
            warn!(%err, uri = %request.uri(), "cannot build upstream uri");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    debug!(method = %request.method(), %target, "forwarding request");
    *request.uri_mut() = target;

    match upstream.client.request(request).await {
        Ok(response) => {
            let response: http::Response<Incoming> = response;
            response.map(Body::new)
        }
        Err(err) => {
            warn!(%err, upstream = %upstream.authority, "upstream request failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
