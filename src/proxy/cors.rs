//! CORS response headers.
//!
//! A convenience for browser dashboards, not an access control layer.

use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
};

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const MAX_AGE_SECS: &str = "86400";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

/// Computes the CORS headers for a response.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
}

impl CorsPolicy {
    pub fn new(origins: AllowedOrigins) -> Self {
        Self { origins }
    }

    /// Parses `*` or a comma-separated origin list.
    ///
    /// An empty value, or a list containing `*`, allows any origin.
    pub fn from_config(raw: &str) -> Self {
        let list: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if list.is_empty() || list.iter().any(|o| o == "*") {
            Self::new(AllowedOrigins::Any)
        } else {
            Self::new(AllowedOrigins::List(list))
        }
    }

    pub fn origins(&self) -> &AllowedOrigins {
        &self.origins
    }

    /// Value for `Access-Control-Allow-Origin`, if one should be sent.
    ///
    /// An allowed Origin is reflected. With a wildcard policy and no Origin
    /// the literal `*` is used. A disallowed Origin gets no header.
    pub fn allow_origin<'a>(&self, origin: Option<&'a str>) -> Option<&'a str> {
        match (&self.origins, origin) {
            (AllowedOrigins::Any, Some(origin)) => Some(origin),
            (AllowedOrigins::Any, None) => Some("*"),
            (AllowedOrigins::List(list), Some(origin)) if list.iter().any(|o| o == origin) => {
                Some(origin)
            }
            (AllowedOrigins::List(_), _) => None,
        }
    }

    /// Adds the CORS headers to `headers`.
    pub fn apply(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));

        if let Some(value) = self
            .allow_origin(origin)
            .and_then(|o| HeaderValue::from_str(o).ok())
        {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new(AllowedOrigins::Any)
    }
}
