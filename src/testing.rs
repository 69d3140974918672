//! Test fixtures: an in-process fake monitoring agent.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::store::{NodeEntry, NodeRegistry};

/// What the fake agent sends back for one request.
#[derive(Debug, Clone)]
pub struct FakeReply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl FakeReply {
    pub fn json(value: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: value.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as seen by the fake agent.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path_and_query: String,
    pub headers: HeaderMap,
}

/// HTTP server on 127.0.0.1 answering with a caller-supplied function
/// of the request path.
pub struct FakeAgent {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    open_connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl FakeAgent {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> FakeReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let respond = Arc::new(respond);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let open_connections = Arc::new(AtomicUsize::new(0));

        let handle = {
            let requests = Arc::clone(&requests);
            let open_connections = Arc::clone(&open_connections);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    let respond = Arc::clone(&respond);
                    let requests = Arc::clone(&requests);
                    let open_connections = Arc::clone(&open_connections);
                    open_connections.fetch_add(1, Ordering::SeqCst);

                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                            let respond = Arc::clone(&respond);
                            let requests = Arc::clone(&requests);
                            async move {
                                let path_and_query = req
                                    .uri()
                                    .path_and_query()
                                    .map(|pq| pq.as_str().to_string())
                                    .unwrap_or_default();
                                requests.lock().unwrap().push(RecordedRequest {
                                    path_and_query,
                                    headers: req.headers().clone(),
                                });

                                let reply = (*respond)(req.uri().path());
                                tokio::time::sleep(reply.delay).await;

                                let mut response = Response::new(Full::new(Bytes::from(reply.body)));
                                *response.status_mut() = reply.status;
                                response
                                    .headers_mut()
                                    .insert(CONTENT_TYPE, "application/json".parse().unwrap());
                                Ok::<_, Infallible>(response)
                            }
                        });
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await;
                        open_connections.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            addr,
            requests,
            open_connections,
            handle,
        }
    }

    /// Agent that answers every path with the same JSON body.
    pub async fn always(reply: FakeReply) -> Self {
        Self::start(move |_| reply.clone()).await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Base URL of a port nobody is listening on.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn node(id: &str, base_url: &str) -> NodeEntry {
    NodeEntry {
        id: id.to_string(),
        display_name: format!("{} node", id),
        base_url: base_url.to_string(),
        credential: format!("secret-{}", id),
    }
}

pub fn registry(nodes: Vec<NodeEntry>) -> Arc<NodeRegistry> {
    Arc::new(NodeRegistry::from_entries(nodes))
}

/// Standard agent success body: `{"status": "success", "data": <data>}`.
pub fn agent_success(data: Value) -> FakeReply {
    FakeReply::json(serde_json::json!({
        "status": "success",
        "data": data,
        "timestamp": "2026-01-01T00:00:00"
    }))
}
