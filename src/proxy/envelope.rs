//! The JSON envelope every API response is wrapped in.

use chrono::{SecondsFormat, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// `{ status, data?, error?, timestamp }`.
///
/// The constructors are the only way to build one, so exactly one of
/// `data` and `error` is ever set and it always agrees with `status`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: String,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            data: Some(data),
            error: None,
            timestamp: now_iso8601(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            data: None,
            error: Some(message.into()),
            timestamp: now_iso8601(),
        }
    }
}

/// UTC timestamp with millisecond precision, e.g. `2026-10-17T08:00:00.000Z`.
fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 200 response carrying `data`.
pub fn success_response(data: Value) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &Envelope::success(data))
}

/// Error response with the status and public message of `err`.
pub fn error_response(err: &ApiError) -> Response<Full<Bytes>> {
    json_response(err.status_code(), &Envelope::error(err.public_message()))
}

/// Empty 200 response for CORS preflight. Headers are added by the caller.
pub fn preflight_response() -> Response<Full<Bytes>> {
    Response::new(Full::new(Bytes::new()))
}

fn json_response(status: StatusCode, envelope: &Envelope) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(envelope) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response envelope");
            br#"{"status":"error","error":"Internal server error"}"#.to_vec()
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_success_envelope_shape() {
        let value = serde_json::to_value(Envelope::success(json!({"uptime": 99}))).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"], json!({"uptime": 99}));
        assert!(value.get("error").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_success_with_null_data_still_has_data_key() {
        let value = serde_json::to_value(Envelope::success(Value::Null)).unwrap();
        assert!(value.as_object().unwrap().contains_key("data"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_envelope_shape() {
        let value = serde_json::to_value(Envelope::error("Not found")).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "Not found");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_timestamp_is_rfc3339_utc_millis() {
        let ts = now_iso8601();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-10-17T08:00:00.000Z".len());
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[tokio::test]
    async fn test_error_response_status_and_body() {
        let err = ApiError::from(ProxyError::NodeNotFound {
            node_id: "unknown".to_string(),
        });
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Node unknown not found");
    }

    #[tokio::test]
    async fn test_success_response_is_200() {
        let response = success_response(json!([1, 2, 3]));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"], json!([1, 2, 3]));
    }

    #[test]
    fn test_preflight_response_is_empty_200() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }
}
