use std::sync::Arc;
use std::task::{Context, Poll};

use audit_log::{LogEntry, Writer};
use axum::body::Body;
use futures_util::future::BoxFuture;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use tower::{Layer, Service};

use crate::capture::{CaptureBody, Finalizer};
use crate::debounce::ErrorDebouncer;
use crate::identity::{self, AUDIT_ID_HEADER};

/// Wraps a service so that every exchange is recorded through a [`Writer`].
#[derive(Clone)]
pub struct AuditLayer {
    writer: Arc<Writer>,
    debouncer: Arc<ErrorDebouncer>,
}

impl AuditLayer {
    pub fn new(writer: Arc<Writer>) -> Self {
        Self::with_debouncer(writer, Arc::new(ErrorDebouncer::default()))
    }

    pub fn with_debouncer(writer: Arc<Writer>, debouncer: Arc<ErrorDebouncer>) -> Self {
        Self { writer, debouncer }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditService {
            inner,
            writer: Arc::clone(&self.writer),
            debouncer: Arc::clone(&self.debouncer),
        }
    }
}

#[derive(Clone)]
pub struct AuditService<S> {
    inner: S,
    writer: Arc<Writer>,
    debouncer: Arc<ErrorDebouncer>,
}

impl<S> Service<Request<Body>> for AuditService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // The clone may not be ready; drive the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let writer = Arc::clone(&self.writer);
        let debouncer = Arc::clone(&self.debouncer);

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let uri = parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);

            let verbosity = writer.resolve_verbosity(&uri);
            let mut entry = LogEntry::new(parts.method.as_str(), uri);
            if let Some(id) = parts
                .headers
                .get(AUDIT_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
            {
                entry.audit_id = id.to_string();
            }
            entry.request_headers = identity::header_map(&parts.headers);
            entry.user = identity::user(&parts.extensions);
            entry.remote_addr = identity::remote_addr(&parts.extensions);

            let login = identity::is_login(&parts.uri);
            let body = if verbosity.request.body || login {
                match body.collect().await {
                    Ok(collected) => {
                        let bytes = collected.to_bytes();
                        if login {
                            entry.user_login_name = identity::login_name(&bytes).unwrap_or_default();
                        }
                        if verbosity.request.body {
                            entry.raw_request_body = Some(bytes.to_vec());
                        }
                        Body::from(bytes)
                    }
                    Err(err) => {
                        tracing::warn!(%err, uri = %entry.request_uri, "failed to read request body for audit");
                        Body::empty()
                    }
                }
            } else {
                body
            };

            let audit_id = entry.audit_id.clone();
            let mut response = inner.call(Request::from_parts(parts, body)).await?;

            if response.status() == StatusCode::SWITCHING_PROTOCOLS {
                tracing::trace!(audit_id = %audit_id, "connection upgraded; no audit entry");
                return Ok(response);
            }

            if let Ok(value) = HeaderValue::from_str(&audit_id) {
                response.headers_mut().insert(AUDIT_ID_HEADER, value);
            }
            entry.response_code = response.status().as_u16();
            entry.response_headers = identity::header_map(response.headers());

            let (parts, body) = response.into_parts();
            let capture = CaptureBody::new(
                body,
                Finalizer {
                    writer,
                    debouncer,
                    entry,
                    verbosity,
                },
            );
            Ok(Response::from_parts(parts, Body::new(capture)))
        })
    }
}
