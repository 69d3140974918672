//! HTTP probe server for orchestrators.
//!
//! Provides `/healthz` (liveness) and `/readyz` (readiness) on a separate
//! listener so probes never go through the API's CORS and envelope logic.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use tokio::net::TcpListener;

use crate::server;
use crate::store::NodeRegistry;

/// Answers a probe request.
///
/// `/healthz` is always 200. `/readyz` is 200 once at least one node is
/// configured and 503 otherwise, since an empty registry usually means
/// the node map failed to parse. Everything else is 404.
pub fn probe_response<B>(req: &Request<B>, registry: &NodeRegistry) -> Response<Full<Bytes>> {
    let (status, body) = match (req.method(), req.uri().path()) {
        (&Method::GET, "/healthz") => (StatusCode::OK, "ok"),
        (&Method::GET, "/readyz") if registry.is_empty() => {
            (StatusCode::SERVICE_UNAVAILABLE, "no nodes configured")
        }
        (&Method::GET, "/readyz") => (StatusCode::OK, "ready"),
        _ => (StatusCode::NOT_FOUND, "not found"),
    };

    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

/// Starts the probe server on the given address.
///
/// Runs indefinitely, accepting connections and answering probes.
pub async fn start_health_server(
    addr: SocketAddr,
    registry: Arc<NodeRegistry>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "probe server listening");
    serve_health(listener, registry).await
}

pub async fn serve_health(listener: TcpListener, registry: Arc<NodeRegistry>) -> std::io::Result<()> {
    server::serve(listener, move |req| {
        let response = probe_response(&req, &registry);
        async move { response }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{node, registry};

    /// Probes go through a real listener since `hyper::body::Incoming`
    /// cannot be constructed directly.
    async fn spawn_probe_server(registry: Arc<NodeRegistry>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = serve_health(listener, registry).await;
        });
        (addr, handle)
    }

    async fn get(addr: SocketAddr, path: &str) -> (u16, String) {
        let response = reqwest::get(format!("http://{}{}", addr, path)).await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let (addr, handle) = spawn_probe_server(registry(vec![])).await;

        assert_eq!(get(addr, "/healthz").await, (200, "ok".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_readyz_with_nodes_returns_ready() {
        let (addr, handle) = spawn_probe_server(registry(vec![node("a", "http://a:1")])).await;

        assert_eq!(get(addr, "/readyz").await, (200, "ready".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_readyz_without_nodes_returns_503() {
        let (addr, handle) = spawn_probe_server(registry(vec![])).await;

        let (status, body) = get(addr, "/readyz").await;
        assert_eq!(status, 503);
        assert_eq!(body, "no nodes configured");

        handle.abort();
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let (addr, handle) = spawn_probe_server(registry(vec![])).await;

        assert_eq!(get(addr, "/foo").await.0, 404);
        assert_eq!(get(addr, "/api/nodes").await.0, 404);

        handle.abort();
    }

    #[test]
    fn test_probe_response_rejects_post() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/healthz")
            .body(())
            .unwrap();
        let response = probe_response(&req, &NodeRegistry::empty());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
