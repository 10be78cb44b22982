//! Transport-neutral request view and MAC target derivation

use crate::error::{OzError, Result};
use std::collections::HashMap;

/// Options that shape how a request is authenticated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticateOptions {
    /// Derive port 443 instead of 80 when the host header has none
    pub is_https: bool,
    /// Read the host from this header instead of `Host` (proxies)
    pub host_header_name: Option<String>,
    /// Shift applied to the server clock, milliseconds
    pub localtime_offset: i64,
}

/// HTTP request as the authenticator sees it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// HTTP method
    pub method: String,
    /// Request target: path and query, or an absolute URL
    pub url: String,
    headers: HashMap<String, String>,
}

/// The request components covered by the MAC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// Upper-cased method
    pub method: String,
    /// Path and query
    pub resource: String,
    /// Lower-cased host
    pub host: String,
    /// Port, explicit or defaulted
    pub port: u16,
}

impl Request {
    /// Create a request without headers
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header; names are case-insensitive
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> Result<&str> {
        self.header("authorization")
            .ok_or_else(|| OzError::InvalidRequest("Missing authorization header".to_string()))
    }

    /// Derive the MAC target
    pub fn target(&self, options: &AuthenticateOptions) -> Result<RequestTarget> {
        let host_header = options.host_header_name.as_deref().unwrap_or("host");
        let value = self
            .header(host_header)
            .ok_or_else(|| OzError::InvalidRequest("Missing host header".to_string()))?;
        let (host, port) = parse_host(value)?;
        let port = port.unwrap_or(if options.is_https { 443 } else { 80 });

        Ok(RequestTarget {
            method: self.method.to_ascii_uppercase(),
            resource: resource(&self.url)?,
            host,
            port,
        })
    }
}

impl From<&actix_web::HttpRequest> for Request {
    fn from(req: &actix_web::HttpRequest) -> Self {
        let headers = req
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        Self {
            method: req.method().as_str().to_string(),
            url: req.uri().to_string(),
            headers,
        }
    }
}

/// Split a host header into lower-cased host and optional port
pub fn parse_host(value: &str) -> Result<(String, Option<u16>)> {
    let value = value.trim();
    let bad = || OzError::InvalidRequest(format!("Invalid host header: {}", value));

    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(bad)?;
        let host = &value[..end + 2];
        match &rest[end + 1..] {
            "" => (host, None),
            tail => (host, Some(tail.strip_prefix(':').ok_or_else(bad)?)),
        }
    } else {
        match value.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        }
    };

    if host.is_empty() || host == "[]" || host.chars().any(char::is_whitespace) {
        return Err(bad());
    }
    let port = port
        .map(|p| p.parse::<u16>().map_err(|_| bad()))
        .transpose()?;

    Ok((host.to_ascii_lowercase(), port))
}

fn resource(url: &str) -> Result<String> {
    if url.starts_with('/') {
        return Ok(url.to_string());
    }

    let parsed = url::Url::parse(url)
        .map_err(|e| OzError::InvalidRequest(format!("Invalid request url: {}", e)))?;
    Ok(match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    })
}
