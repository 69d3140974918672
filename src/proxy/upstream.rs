//! Upstream forwarding to monitoring agents.
//!
//! Resolves a node id through the registry, issues a single GET with the
//! node's bearer credential, and normalizes the outcome into a JSON
//! payload or a typed [`ProxyError`]. No retries.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use hyper::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::error::ProxyError;
use crate::store::{NodeEntry, NodeRegistry};

/// User-Agent sent on every upstream request.
pub const GATEWAY_USER_AGENT: &str = "VPS-Traffic-Monitor-Worker/1.0";

/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One call to forward: which node, which agent endpoint, which query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub node_id: String,
    pub relative_path: String,
    pub query: Vec<(String, String)>,
}

impl ProxyRequest {
    pub fn new(node_id: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            relative_path: relative_path.into(),
            query: Vec::new(),
        }
    }

    /// Appends a query parameter. Order of calls is the order on the wire.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Outcome of a forwarded call.
pub type ProxyResult = Result<Value, ProxyError>;

/// Forwards requests to registered nodes.
///
/// Cheap to clone: the registry is shared and `reqwest::Client` is a
/// handle over a shared connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    registry: Arc<NodeRegistry>,
    client: Client,
    timeout: Duration,
}

impl Forwarder {
    /// Creates a Forwarder with its own connection pool. The client sends
    /// [`GATEWAY_USER_AGENT`] on every request.
    pub fn new(registry: Arc<NodeRegistry>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(GATEWAY_USER_AGENT).build()?;
        Ok(Self {
            registry,
            client,
            timeout,
        })
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forwards one request and returns the parsed upstream JSON.
    ///
    /// Unknown nodes fail before any network I/O. The timeout covers the
    /// whole exchange including the body; on expiry the in-flight request
    /// future is dropped, which closes its connection.
    pub async fn forward(&self, request: &ProxyRequest) -> ProxyResult {
        let node = self
            .registry
            .resolve(&request.node_id)
            .ok_or_else(|| ProxyError::NodeNotFound {
                node_id: request.node_id.clone(),
            })?;

        let url = upstream_url(&node.base_url, &request.relative_path, &request.query).map_err(
            |e| ProxyError::Internal {
                node_id: node.id.clone(),
                reason: format!("invalid upstream URL: {}", e),
            },
        )?;

        tracing::debug!(node_id = %node.id, url = %url, "forwarding request");

        let result = match tokio::time::timeout(self.timeout, self.fetch_json(node, url)).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Timeout {
                node_id: node.id.clone(),
                timeout: self.timeout,
            }),
        };

        if let Err(ref e) = result {
            tracing::warn!(node_id = e.node_id(), kind = ?e.kind(), error = %e, "upstream call failed");
        }
        result
    }

    async fn fetch_json(&self, node: &NodeEntry, url: Url) -> ProxyResult {
        let response = self
            .client
            .get(url)
            .bearer_auth(&node.credential)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(node, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                node_id: node.id.clone(),
                reason: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown Status")
                ),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(node, &e))?;

        serde_json::from_slice(&body).map_err(|e| ProxyError::Upstream {
            node_id: node.id.clone(),
            reason: format!("invalid JSON in response: {}", e),
        })
    }
}

/// Builds `base_url + relative_path` with the query pairs appended in order.
///
/// Pairs are form-urlencoded; an empty pair list leaves the URL without `?`.
pub fn upstream_url(
    base_url: &str,
    relative_path: &str,
    query: &[(String, String)],
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{}{}", base_url, relative_path))?;
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(url)
}

/// Maps a reqwest failure to a ProxyError.
///
/// Builder errors (e.g. a credential that is not a valid header value) are
/// our fault, everything else is the upstream's.
fn transport_error(node: &NodeEntry, err: &reqwest::Error) -> ProxyError {
    if err.is_builder() {
        return ProxyError::Internal {
            node_id: node.id.clone(),
            reason: "failed to build upstream request".to_string(),
        };
    }
    ProxyError::Upstream {
        node_id: node.id.clone(),
        reason: error_chain(err),
    }
}

/// Joins an error and its sources, e.g. `error sending request: connection refused`.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
