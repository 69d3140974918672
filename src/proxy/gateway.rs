//! Request dispatcher for the gateway API.
//!
//! Ties the route table, Forwarder and Aggregator together and renders
//! every outcome as a JSON envelope with CORS headers attached.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::ORIGIN;
use hyper::{Method, Request, Response, Uri};
use serde_json::{json, Value};

use super::aggregator::Aggregator;
use super::cors::CorsPolicy;
use super::envelope;
use super::router::{self, NodeEndpoint, Route};
use super::upstream::{Forwarder, ProxyRequest};
use crate::error::ApiError;
use crate::store::NodeRegistry;

const PERIOD_PARAM: &str = "period";
const DEFAULT_PERIOD: &str = "d";

/// The gateway's request handler.
///
/// Stages per request: CORS preflight short-circuit, route match,
/// parameter extraction, delegation, envelope. A panic anywhere after
/// the preflight check becomes a generic 500 envelope.
pub struct Gateway {
    registry: Arc<NodeRegistry>,
    forwarder: Forwarder,
    aggregator: Aggregator,
    cors: CorsPolicy,
}

impl Gateway {
    /// Creates a Gateway over the forwarder's registry.
    pub fn new(forwarder: Forwarder, cors: CorsPolicy) -> Self {
        Self {
            registry: Arc::clone(forwarder.registry()),
            aggregator: Aggregator::new(forwarder.clone()),
            forwarder,
            cors,
        }
    }

    /// Handles one inbound request. Never fails; every error is an envelope.
    ///
    /// The request body is ignored, so any body type is accepted.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        let started = Instant::now();
        let origin = req
            .headers()
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let method = req.method().clone();
        let uri = req.uri().clone();

        let mut response = if method == Method::OPTIONS {
            envelope::preflight_response()
        } else {
            guarded(uri.path(), self.dispatch(&method, &uri)).await
        };

        self.cors.apply(origin.as_deref(), response.headers_mut());

        tracing::info!(
            method = %method,
            path = uri.path(),
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }

    async fn dispatch(&self, method: &Method, uri: &Uri) -> Result<Value, ApiError> {
        let matched = router::match_route(method, uri.path()).ok_or(ApiError::RouteNotFound)?;

        match matched.route {
            Route::ListNodes => Ok(self.list_nodes()),
            Route::AllNodeStatus => {
                let reports = self.aggregator.aggregate_status().await;
                serde_json::to_value(reports).map_err(|e| ApiError::Internal(e.to_string()))
            }
            Route::Node(endpoint) => {
                let node_id = matched.node_id()?;
                let request = node_request(node_id, endpoint, uri.query());
                Ok(self.forwarder.forward(&request).await?)
            }
        }
    }

    /// `[{id, name, url}]` in registry order. Credentials are not listed.
    fn list_nodes(&self) -> Value {
        Value::Array(
            self.registry
                .list()
                .iter()
                .map(|node| {
                    json!({
                        "id": node.id,
                        "name": node.display_name,
                        "url": node.base_url,
                    })
                })
                .collect(),
        )
    }
}

/// Renders the outcome of `fut` as an envelope.
///
/// A panic inside `fut` becomes a 500 with the generic message; the panic
/// text is logged and never sent to the caller.
async fn guarded<F>(path: &str, fut: F) -> Response<Full<Bytes>>
where
    F: Future<Output = Result<Value, ApiError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(data)) => envelope::success_response(data),
        Ok(Err(err)) => {
            if let ApiError::Internal(ref detail) = err {
                tracing::error!(path, detail = %detail, "internal error while handling request");
            }
            envelope::error_response(&err)
        }
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            tracing::error!(path, detail = %detail, "request handler panicked");
            envelope::error_response(&ApiError::Internal(detail))
        }
    }
}

/// Builds the upstream call for a per-node route.
///
/// The history route carries `period` (default `d`, also used when the
/// value is empty). The value is not validated; the agent decides. It is
/// form-decoded here and form-encoded again on the upstream URL, so the
/// agent sees the same value, possibly spelled differently (`%20` as `+`).
fn node_request(node_id: String, endpoint: NodeEndpoint, query: Option<&str>) -> ProxyRequest {
    let request = ProxyRequest::new(node_id, endpoint.upstream_path());
    match endpoint {
        NodeEndpoint::TrafficHistory => {
            let period = router::query_param(query, PERIOD_PARAM)
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PERIOD.to_string());
            request.with_query_param(PERIOD_PARAM, period)
        }
        _ => request,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
