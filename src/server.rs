//! HTTP/1 accept loop shared by the API and probe listeners.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::proxy::Gateway;

/// Accepts connections forever, serving each on its own task with `handler`.
///
/// Returns only if accepting fails.
pub async fn serve<H, Fut>(listener: TcpListener, handler: H) -> std::io::Result<()>
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let fut = handler(req);
                async move { Ok::<_, Infallible>(fut.await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(peer = %peer, error = %e, "connection error");
            }
        });
    }
}

/// Serves the gateway API on an already bound listener.
pub async fn serve_gateway(listener: TcpListener, gateway: Arc<Gateway>) -> std::io::Result<()> {
    serve(listener, move |req| {
        let gateway = Arc::clone(&gateway);
        async move { gateway.handle(req).await }
    })
    .await
}

/// Binds `addr` and serves the gateway API.
pub async fn start_gateway_server(addr: SocketAddr, gateway: Arc<Gateway>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "gateway listening");
    serve_gateway(listener, gateway).await
}
