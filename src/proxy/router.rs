//! Route table for the gateway API.
//!
//! Matches `method + path` against a fixed table of segment patterns.
//! A `:id` segment captures the node id; every other segment must match
//! exactly. Patterns never overlap, so the first match wins.

use hyper::Method;

use crate::error::ApiError;

/// Agent endpoints reachable through `/api/nodes/:id/...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEndpoint {
    Traffic,
    TrafficRealtime,
    TrafficHistory,
    Interfaces,
    Status,
}

impl NodeEndpoint {
    /// Path on the agent, appended to the node's base URL.
    pub fn upstream_path(self) -> &'static str {
        match self {
            NodeEndpoint::Traffic => "/traffic",
            NodeEndpoint::TrafficRealtime => "/traffic/realtime",
            NodeEndpoint::TrafficHistory => "/traffic/history",
            NodeEndpoint::Interfaces => "/interfaces",
            NodeEndpoint::Status => "/status",
        }
    }
}

/// A matched API route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ListNodes,
    AllNodeStatus,
    Node(NodeEndpoint),
}

const NODE_ID_PARAM: &str = ":id";

const ROUTE_TABLE: &[(&str, Route)] = &[
    ("/api/nodes", Route::ListNodes),
    ("/api/nodes/status", Route::AllNodeStatus),
    ("/api/nodes/:id/traffic", Route::Node(NodeEndpoint::Traffic)),
    (
        "/api/nodes/:id/traffic/realtime",
        Route::Node(NodeEndpoint::TrafficRealtime),
    ),
    (
        "/api/nodes/:id/traffic/history",
        Route::Node(NodeEndpoint::TrafficHistory),
    ),
    ("/api/nodes/:id/interfaces", Route::Node(NodeEndpoint::Interfaces)),
    ("/api/nodes/:id/status", Route::Node(NodeEndpoint::Status)),
];

/// Result of a successful table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub route: Route,
    raw_node_id: Option<&'a str>,
}

impl RouteMatch<'_> {
    /// Extracts the node id path parameter.
    ///
    /// Shared by every per-node route. An empty segment (`/api/nodes//traffic`)
    /// is [`ApiError::MissingNodeId`]. Percent-escapes are decoded; a segment
    /// that does not decode to UTF-8 is used verbatim.
    pub fn node_id(&self) -> Result<String, ApiError> {
        let raw = self.raw_node_id.unwrap_or_default();
        let decoded = urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        if decoded.is_empty() {
            return Err(ApiError::MissingNodeId);
        }
        Ok(decoded)
    }
}

/// Finds the route for a request. Only `GET` is routable.
pub fn match_route<'a>(method: &Method, path: &'a str) -> Option<RouteMatch<'a>> {
    if method != Method::GET {
        return None;
    }
    ROUTE_TABLE.iter().find_map(|(pattern, route)| {
        match_pattern(pattern, path).map(|raw_node_id| RouteMatch {
            route: *route,
            raw_node_id,
        })
    })
}

/// Matches a path against a pattern segment by segment.
///
/// Returns `Some(captured)` on a match, where `captured` is the `:id`
/// segment if the pattern has one.
fn match_pattern<'a>(pattern: &str, path: &'a str) -> Option<Option<&'a str>> {
    let mut pattern_segments = pattern.split('/');
    let mut path_segments = path.split('/');
    let mut captured = None;

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return Some(captured),
            (Some(NODE_ID_PARAM), Some(segment)) => captured = Some(segment),
            (Some(expected), Some(segment)) if expected == segment => {}
            _ => return None,
        }
    }
}

/// First value of `key` in a raw query string, form-decoded.
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
