//! Access logging middleware: one line per scrape with client, status and
//! latency. Health probes are logged at debug.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::Method;
use axum::response::Response;
use tracing::{debug, info};

/// What gets logged about one request, captured before it is handed on.
#[derive(Debug)]
struct RequestLine {
    method: Method,
    path: String,
    client: Option<SocketAddr>,
    started: Instant,
}

impl RequestLine {
    fn capture(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_owned(),
            client: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            started: Instant::now(),
        }
    }

    fn is_probe(&self) -> bool {
        self.path == "/health"
    }

    fn client_ip(&self) -> String {
        self.client
            .map_or_else(|| "-".to_owned(), |addr| addr.ip().to_string())
    }

    fn log(&self, status: u16) {
        let latency_ms = self.started.elapsed().as_millis() as u64;
        let client = self.client_ip();
        let (method, path) = (&self.method, &self.path);
        if self.is_probe() {
            debug!(client, status, latency_ms, "{method} {path}");
        } else {
            info!(client, status, latency_ms, "{method} {path}");
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct AccessLogLayer;

impl<S> tower::Layer<S> for AccessLogLayer {
    type Service = AccessLog<S>;
    fn layer(&self, inner: S) -> Self::Service {
        AccessLog(inner)
    }
}

#[derive(Clone)]
pub(crate) struct AccessLog<S>(S);

impl<S> tower::Service<Request> for AccessLog<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let line = RequestLine::capture(&req);
        // The clone may not be ready; swap so the polled-ready service handles this call.
        let clone = self.0.clone();
        let mut ready = std::mem::replace(&mut self.0, clone);
        Box::pin(async move {
            let response = ready.call(req).await?;
            line.log(response.status().as_u16());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, client: Option<&str>) -> Request {
        let mut req = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        if let Some(addr) = client {
            let addr: SocketAddr = addr.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn captures_client_ip_without_port() {
        let line = RequestLine::capture(&request("/metrics", Some("10.1.2.3:51234")));
        assert_eq!(line.client_ip(), "10.1.2.3");
        assert_eq!(line.method, Method::GET);
        assert_eq!(line.path, "/metrics");
        assert!(!line.is_probe());
    }

    #[test]
    fn unknown_client_and_health_probe() {
        let line = RequestLine::capture(&request("/health?verbose=1", None));
        assert_eq!(line.client_ip(), "-");
        assert!(line.is_probe());
    }
}
