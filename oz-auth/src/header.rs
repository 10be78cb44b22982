//! Authorization Header
//!
//! Two forms are understood:
//!
//! ```text
//! Oz id="<ticket id>", app="<app id>", ts="<unix ms>"[, ext="…"][, dlg="…"], mac="…"
//! Oz ticket="<ticket id>", ts="<unix ms>"[, ext="…"], mac="…"
//! ```
//!
//! Parsing is strict: unknown or duplicate attributes, attributes that do
//! not belong to the chosen form, malformed quoting and trailing content
//! are all rejected.

use crate::error::{OzError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static SCHEME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+)(?:\s+(.*?))?\s*$").expect("valid scheme regex"));

static ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([a-z]+)="((?:[^"\\]|\\.)*)"\s*(,)?"#).expect("valid attribute regex")
});

const KNOWN_ATTRIBUTES: [&str; 7] = ["id", "ticket", "app", "ts", "ext", "dlg", "mac"];

/// How the request names its ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketReference {
    /// Ticket id plus the application it claims to belong to
    Id {
        /// Sealed ticket id
        id: String,
        /// Asserted application
        app: String,
    },
    /// Ticket id only; the application comes from the ticket itself
    Embedded(String),
}

impl TicketReference {
    /// Sealed ticket id
    pub fn ticket_id(&self) -> &str {
        match self {
            Self::Id { id, .. } => id,
            Self::Embedded(id) => id,
        }
    }

    /// Application asserted by the header, if any
    pub fn asserted_app(&self) -> Option<&str> {
        match self {
            Self::Id { app, .. } => Some(app),
            Self::Embedded(_) => None,
        }
    }
}

/// Per-request attributes supplied by the signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAttributes {
    /// Timestamp, Unix milliseconds
    pub ts: i64,
    /// Application-specific data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    /// Delegating application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlg: Option<String>,
    /// Request MAC
    pub mac: String,
}

/// Parsed `Authorization` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    /// Ticket reference
    pub ticket: TicketReference,
    /// Signed attributes
    pub attributes: RequestAttributes,
}

impl AuthorizationHeader {
    /// Parse a header value
    pub fn parse(header: &str) -> Result<Self> {
        let captures = SCHEME_PATTERN
            .captures(header)
            .ok_or_else(|| invalid("Missing authorization scheme"))?;
        let scheme = captures.get(1).map_or("", |m| m.as_str());
        if !scheme.eq_ignore_ascii_case(crate::SCHEME) {
            return Err(invalid("Unsupported authorization scheme"));
        }

        let mut rest = captures.get(2).map_or("", |m| m.as_str());
        let mut attributes: HashMap<&str, String> = HashMap::new();
        while !rest.is_empty() {
            let captures = ATTRIBUTE_PATTERN
                .captures(rest)
                .ok_or_else(|| invalid("Malformed attribute"))?;
            let whole = captures.get(0).map_or("", |m| m.as_str());
            let name = captures.get(1).map_or("", |m| m.as_str());
            let value = captures.get(2).map_or("", |m| m.as_str());
            let separated = captures.get(3).is_some();

            if !KNOWN_ATTRIBUTES.contains(&name) {
                return Err(invalid(&format!("Unknown attribute: {}", name)));
            }
            if attributes.insert(name, unescape(value)?).is_some() {
                return Err(invalid(&format!("Duplicate attribute: {}", name)));
            }

            rest = &rest[whole.len()..];
            match (separated, rest.trim().is_empty()) {
                (true, true) => return Err(invalid("Trailing separator")),
                (false, false) => return Err(invalid("Missing separator")),
                _ => {}
            }
            rest = rest.trim_start();
        }

        let ticket = match (attributes.remove("id"), attributes.remove("ticket")) {
            (Some(id), None) => {
                let app = attributes
                    .remove("app")
                    .ok_or_else(|| invalid("Missing app attribute"))?;
                TicketReference::Id { id, app }
            }
            (None, Some(id)) => {
                for name in ["app", "dlg"] {
                    if attributes.contains_key(name) {
                        return Err(invalid(&format!(
                            "Attribute not allowed with embedded ticket: {}",
                            name
                        )));
                    }
                }
                TicketReference::Embedded(id)
            }
            (Some(_), Some(_)) => return Err(invalid("Both id and ticket attributes present")),
            (None, None) => return Err(invalid("Missing id attribute")),
        };

        let ts = attributes
            .remove("ts")
            .ok_or_else(|| invalid("Missing ts attribute"))?;
        let ts = ts
            .parse::<i64>()
            .map_err(|_| invalid("Invalid ts attribute"))?;
        let mac = attributes
            .remove("mac")
            .ok_or_else(|| invalid("Missing mac attribute"))?;

        if ticket.ticket_id().is_empty() || mac.is_empty() {
            return Err(invalid("Empty required attribute"));
        }
        if matches!(&ticket, TicketReference::Id { app, .. } if app.is_empty()) {
            return Err(invalid("Empty app attribute"));
        }

        Ok(Self {
            ticket,
            attributes: RequestAttributes {
                ts,
                ext: attributes.remove("ext"),
                dlg: attributes.remove("dlg"),
                mac,
            },
        })
    }

    /// Format as a header value
    pub fn to_header(&self) -> String {
        let mut header = format!("{} ", crate::SCHEME);
        match &self.ticket {
            TicketReference::Id { id, app } => {
                header.push_str(&format!("id=\"{}\", app=\"{}\"", escape(id), escape(app)));
            }
            TicketReference::Embedded(id) => {
                header.push_str(&format!("ticket=\"{}\"", escape(id)));
            }
        }
        header.push_str(&format!(", ts=\"{}\"", self.attributes.ts));
        if let Some(ext) = &self.attributes.ext {
            header.push_str(&format!(", ext=\"{}\"", escape(ext)));
        }
        if let Some(dlg) = &self.attributes.dlg {
            header.push_str(&format!(", dlg=\"{}\"", escape(dlg)));
        }
        header.push_str(&format!(", mac=\"{}\"", escape(&self.attributes.mac)));
        header
    }
}

fn invalid(message: &str) -> OzError {
    OzError::InvalidRequest(format!("Bad authorization header: {}", message))
}

/// Backslash-escape `\` and `"`
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unescape(value: &str) -> Result<String> {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | '"')) => unescaped.push(next),
                _ => return Err(invalid("Invalid escape sequence")),
            }
        } else {
            unescaped.push(c);
        }
    }
    Ok(unescaped)
}
