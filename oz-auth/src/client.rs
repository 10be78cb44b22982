//! Client-side request signing

use crate::{
    authenticator::{compute_mac, MacCredentials},
    error::{OzError, Result},
    header::{AuthorizationHeader, RequestAttributes, TicketReference},
    now_millis,
    request::RequestTarget,
};

/// Options for [`header`]
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Timestamp override, Unix milliseconds
    pub ts: Option<i64>,
    /// Application data to sign
    pub ext: Option<String>,
    /// Shift applied to the local clock, milliseconds
    pub localtime_offset: i64,
    /// Use the `ticket="…"` form instead of `id="…", app="…"`
    pub embed_ticket: bool,
}

/// Signed header ready to send
#[derive(Debug, Clone)]
pub struct ClientHeader {
    /// `Authorization` header value
    pub field: String,
    /// Attributes that were signed
    pub attributes: RequestAttributes,
}

/// Build the `Authorization` header for `method url`
pub fn header(
    url: &str,
    method: &str,
    credentials: &MacCredentials<'_>,
    options: &ClientOptions,
) -> Result<ClientHeader> {
    let target = target(url, method)?;
    let ts = options
        .ts
        .unwrap_or_else(|| now_millis().saturating_add(options.localtime_offset));
    let mac = compute_mac(&target, ts, options.ext.as_deref(), credentials);

    let (ticket, dlg) = if options.embed_ticket {
        (TicketReference::Embedded(credentials.id.to_string()), None)
    } else {
        (
            TicketReference::Id {
                id: credentials.id.to_string(),
                app: credentials.app.to_string(),
            },
            credentials.delegated_by.map(str::to_string),
        )
    };

    let header = AuthorizationHeader {
        ticket,
        attributes: RequestAttributes {
            ts,
            ext: options.ext.clone(),
            dlg,
            mac,
        },
    };

    Ok(ClientHeader {
        field: header.to_header(),
        attributes: header.attributes,
    })
}

fn target(url: &str, method: &str) -> Result<RequestTarget> {
    let parsed = url::Url::parse(url)
        .map_err(|e| OzError::InvalidRequest(format!("Invalid url {}: {}", url, e)))?;
    let host = match parsed.host() {
        Some(url::Host::Domain(domain)) => domain.to_ascii_lowercase(),
        Some(host) => host.to_string(),
        None => return Err(OzError::InvalidRequest(format!("Url has no host: {}", url))),
    };
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| OzError::InvalidRequest(format!("Url has no port: {}", url)))?;
    let resource = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };

    Ok(RequestTarget {
        method: method.to_ascii_uppercase(),
        resource,
        host,
        port,
    })
}
