//! Fleet-wide status aggregation.
//!
//! Queries `/status` on every registered node at once and reports each
//! node as online or offline. A failing node is a data point in the
//! report, never a failure of the aggregate.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;

use super::upstream::{Forwarder, ProxyRequest, ProxyResult};
use crate::store::NodeEntry;

const STATUS_PATH: &str = "/status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Online,
    Offline,
}

/// One node's entry in the aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusReport {
    pub node_id: String,
    pub name: String,
    pub status: NodeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeStatusReport {
    /// Classifies the outcome of a node's `/status` call.
    ///
    /// Online only when the agent answered with `"status": "success"`;
    /// `data` is the agent's `data` field, or the whole payload if the agent
    /// sent none. Any other answer, or no answer, is offline.
    pub fn from_result(node: &NodeEntry, result: ProxyResult) -> Self {
        let (status, data, error) = match result {
            Ok(payload) if is_success(&payload) => {
                let inner = payload.get("data").filter(|d| !d.is_null()).cloned();
                (NodeState::Online, Some(inner.unwrap_or(payload)), None)
            }
            Ok(payload) => {
                let error = payload
                    .get("error")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| format!("node {} did not report success", node.id));
                (NodeState::Offline, None, Some(error))
            }
            Err(e) => (NodeState::Offline, None, Some(e.to_string())),
        };

        Self {
            node_id: node.id.clone(),
            name: node.display_name.clone(),
            status,
            data,
            error,
        }
    }

    fn lost(node: &NodeEntry) -> Self {
        Self {
            node_id: node.id.clone(),
            name: node.display_name.clone(),
            status: NodeState::Offline,
            data: None,
            error: Some(format!("status check for node {} was aborted", node.id)),
        }
    }
}

fn is_success(payload: &Value) -> bool {
    payload.get("status").and_then(Value::as_str) == Some("success")
}

/// Runs the concurrent `/status` fan-out.
#[derive(Debug, Clone)]
pub struct Aggregator {
    forwarder: Forwarder,
}

impl Aggregator {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }

    /// Returns one report per registered node, in registry order.
    ///
    /// Every node gets its own task and its own timeout, so the call takes
    /// as long as the slowest node, capped by the per-call timeout. Results
    /// are placed back into registry order after all tasks finish.
    pub async fn aggregate_status(&self) -> Vec<NodeStatusReport> {
        let reports = fan_out(self.forwarder.registry().list(), |node| {
            let forwarder = self.forwarder.clone();
            async move {
                let request = ProxyRequest::new(node.id.clone(), STATUS_PATH);
                let result = forwarder.forward(&request).await;
                NodeStatusReport::from_result(&node, result)
            }
        })
        .await;

        let online = reports
            .iter()
            .filter(|r| r.status == NodeState::Online)
            .count();
        tracing::debug!(nodes = reports.len(), online, "aggregated node status");

        reports
    }
}

/// Runs `check` for every node on its own task and returns the reports in
/// `nodes` order. A task that panics or is cancelled yields an offline
/// report for its node.
async fn fan_out<F, Fut>(nodes: &[NodeEntry], check: F) -> Vec<NodeStatusReport>
where
    F: Fn(NodeEntry) -> Fut,
    Fut: Future<Output = NodeStatusReport> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (position, node) in nodes.iter().enumerate() {
        let report = check(node.clone());
        tasks.spawn(async move { (position, report.await) });
    }

    let mut slots: Vec<Option<NodeStatusReport>> = vec![None; nodes.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, report)) => slots[position] = Some(report),
            Err(e) => tracing::error!(error = %e, "status task failed"),
        }
    }

    slots
        .into_iter()
        .zip(nodes)
        .map(|(slot, node)| slot.unwrap_or_else(|| NodeStatusReport::lost(node)))
        .collect()
}
