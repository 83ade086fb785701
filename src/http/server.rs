//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a single catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener with connect info
//! - Stop accepting on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::lifecycle::Shutdown;
use crate::proxy::{Forwarder, HttpUpstream, InboundRequest, Upstream};

/// Error type for server construction.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
pub struct AppState<U> {
    pub forwarder: Arc<Forwarder<U>>,
}

impl<U> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            forwarder: self.forwarder.clone(),
        }
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    shutdown: Arc<Shutdown>,
}

impl HttpServer {
    /// Create a server forwarding through the `reqwest` upstream client.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let upstream = HttpUpstream::new(&config.timeouts)?;
        Ok(Self::with_upstream(config, upstream))
    }

    /// Create a server forwarding through `upstream`.
    pub fn with_upstream<U: Upstream>(config: ProxyConfig, upstream: U) -> Self {
        let shutdown = Arc::new(Shutdown::new());
        let forwarder = Arc::new(Forwarder::new(&config, upstream, shutdown.clone()));
        let router = Self::build_router(AppState { forwarder });

        Self {
            router,
            config,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router<U: Upstream>(state: AppState<U>) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .request_id()
                .map(|id| id.to_string())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
            )
        });

        Router::new()
            .fallback(proxy_handler::<U>)
            .with_state(state)
            .layer(trace)
            .layer(RequestIdLayer)
    }

    /// Handle used to stop the server and abort pending upstream calls.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let mut shutdown = self.shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Catch-all handler: every method and path is forwarded.
async fn proxy_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    request: Request<Body>,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    state
        .forwarder
        .handle(InboundRequest::from_http(request, peer))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{OutboundBody, OutboundRequest, UpstreamError, UpstreamResponse};
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
    use tower::ServiceExt;

    /// Answers with the target URL, method and body kind it was asked for.
    struct EchoUpstream;

    impl Upstream for EchoUpstream {
        async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
            let kind = match request.body {
                OutboundBody::Empty => "empty",
                OutboundBody::Stream(_) => "stream",
                OutboundBody::Buffered(_) => "buffered",
            };
            let mut headers = HeaderMap::new();
            headers.insert("x-body-kind", HeaderValue::from_static(kind));
            headers.insert(
                "x-forwarded-for-seen",
                request.headers["x-forwarded-for"].clone(),
            );
            Ok(UpstreamResponse {
                status: StatusCode::OK,
                reason: None,
                headers,
                body: Body::from(format!("{} {}", request.method, request.url)),
            })
        }
    }

    fn server() -> HttpServer {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = "https://api.example.com".into();
        HttpServer::with_upstream(config, EchoUpstream)
    }

    #[tokio::test]
    async fn test_any_method_and_path_is_forwarded() {
        for (method, uri) in [
            (Method::GET, "/"),
            (Method::DELETE, "/v1/files/abc?force=1"),
            (Method::PATCH, "/deeply/nested/path"),
        ] {
            let response = server()
                .router
                .oneshot(
                    Request::builder()
                        .method(method.clone())
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(
                String::from_utf8(body.to_vec()).unwrap(),
                format!("{} https://api.example.com{}", method, uri)
            );
        }
    }

    #[tokio::test]
    async fn test_body_streams_without_rewrite_configured() {
        let response = server()
            .router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/messages")
                    .body(Body::from(r#"{"system":[{"text":"A"}]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-body-kind"], "stream");
        assert_eq!(response.headers()["x-forwarded-for-seen"], "unknown");
    }

    #[tokio::test]
    async fn test_peer_address_used_for_forwarded_for() {
        let mut request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.0.2.7:40000".parse().unwrap()));

        let response = server().router.oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-forwarded-for-seen"], "192.0.2.7");
    }
}
