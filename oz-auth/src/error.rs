//! Error types for Oz

use serde::Serialize;

/// Result type for Oz operations
pub type Result<T> = std::result::Result<T, OzError>;

/// Failures of the sealed envelope codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SealError {
    /// Wrong field count or undecodable component
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// HMAC mismatch (tampering or wrong password)
    #[error("integrity check failed")]
    Integrity,

    /// Envelope authenticated but the payload could not be read back
    #[error("cannot read envelope payload: {0}")]
    Deserialization(String),

    /// Key derivation, randomness or cipher failure while sealing
    #[error("crypto failure: {0}")]
    Crypto(String),
}

/// Which sealed credential an envelope failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Ticket id
    Ticket,
    /// RSVP value
    Rsvp,
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ticket => write!(f, "ticket"),
            Self::Rsvp => write!(f, "rsvp"),
        }
    }
}

/// Error taxonomy, one kind per failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed header, missing attributes, bad Host header
    InvalidRequest,
    /// Bad Basic credentials, unknown application
    InvalidClient,
    /// Envelope HMAC mismatch
    IntegrityFailure,
    /// Envelope decrypted but payload unreadable
    DeserializationFailure,
    /// Wrong field count in sealed string
    MalformedEnvelope,
    /// Ticket, RSVP or grant past expiry
    ExpiredCredential,
    /// Per-request MAC mismatch
    InvalidMac,
    /// Outside the replay window
    StaleTimestamp,
    /// Asserted application does not match the credential
    MismatchedApplication,
    /// Wrong ticket class for the endpoint
    InvalidEntity,
    /// Missing, expired or mismatched grant
    InvalidGrant,
    /// Scope malformed or not a subset
    InvalidScope,
    /// Ticket or application has no delegation rights
    DelegationNotAllowed,
    /// Collaborator lookup failed
    LookupFailed,
    /// Invalid settings or password
    Configuration,
    /// Randomness, cipher or task failure
    Internal,
}

/// Oz protocol errors
#[derive(Debug, thiserror::Error)]
pub enum OzError {
    /// Malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client authentication failed
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Sealed credential could not be opened
    #[error("Invalid {credential}: {source}")]
    InvalidCredential {
        /// Credential being opened
        credential: CredentialKind,
        /// Codec failure
        #[source]
        source: SealError,
    },

    /// Credential has expired
    #[error("Expired {0}")]
    ExpiredCredential(String),

    /// Request MAC mismatch
    #[error("Bad mac")]
    InvalidMac,

    /// Request timestamp outside the replay window
    #[error("Stale timestamp: {skew}ms outside window of {window}ms")]
    StaleTimestamp {
        /// Observed skew in milliseconds
        skew: i64,
        /// Allowed window in milliseconds
        window: i64,
    },

    /// Asserted application does not match the credential
    #[error("Mismatched application: {0}")]
    MismatchedApplication(String),

    /// Wrong ticket class
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// Grant unusable
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Scope violation
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Delegation not allowed
    #[error("Delegation not allowed: {0}")]
    DelegationNotAllowed(String),

    /// Collaborator failure
    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl OzError {
    /// Wrap a codec failure for the given credential
    pub fn credential(credential: CredentialKind, source: SealError) -> Self {
        match source {
            SealError::Crypto(msg) => OzError::InternalError(msg),
            source => OzError::InvalidCredential { credential, source },
        }
    }

    /// Taxonomy kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            OzError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            OzError::InvalidClient(_) => ErrorKind::InvalidClient,
            OzError::InvalidCredential { source, .. } => match source {
                SealError::Malformed(_) => ErrorKind::MalformedEnvelope,
                SealError::Integrity => ErrorKind::IntegrityFailure,
                SealError::Deserialization(_) => ErrorKind::DeserializationFailure,
                SealError::Crypto(_) => ErrorKind::Internal,
            },
            OzError::ExpiredCredential(_) => ErrorKind::ExpiredCredential,
            OzError::InvalidMac => ErrorKind::InvalidMac,
            OzError::StaleTimestamp { .. } => ErrorKind::StaleTimestamp,
            OzError::MismatchedApplication(_) => ErrorKind::MismatchedApplication,
            OzError::InvalidEntity(_) => ErrorKind::InvalidEntity,
            OzError::InvalidGrant(_) => ErrorKind::InvalidGrant,
            OzError::InvalidScope(_) => ErrorKind::InvalidScope,
            OzError::DelegationNotAllowed(_) => ErrorKind::DelegationNotAllowed,
            OzError::LookupFailed(_) => ErrorKind::LookupFailed,
            OzError::ConfigError(_) => ErrorKind::Configuration,
            OzError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure came from a collaborator rather than the protocol
    pub fn is_transient(&self) -> bool {
        matches!(self, OzError::LookupFailed(_))
    }

    /// Stable machine-readable code for callers.
    ///
    /// Envelope sub-kinds collapse into `invalid_credential`.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidClient => "invalid_client",
            ErrorKind::IntegrityFailure
            | ErrorKind::DeserializationFailure
            | ErrorKind::MalformedEnvelope => "invalid_credential",
            ErrorKind::ExpiredCredential => "expired_credential",
            ErrorKind::InvalidMac => "invalid_mac",
            ErrorKind::StaleTimestamp => "stale_timestamp",
            ErrorKind::MismatchedApplication => "mismatched_application",
            ErrorKind::InvalidEntity => "invalid_entity",
            ErrorKind::InvalidGrant => "invalid_grant",
            ErrorKind::InvalidScope => "invalid_scope",
            ErrorKind::DelegationNotAllowed => "delegation_not_allowed",
            ErrorKind::LookupFailed => "lookup_failed",
            ErrorKind::Configuration | ErrorKind::Internal => "server_error",
        }
    }

    /// Human string safe to return to a remote caller
    pub fn public_message(&self) -> String {
        match self {
            OzError::InvalidCredential { .. } => "Invalid credential".to_string(),
            OzError::ConfigError(_) | OzError::InternalError(_) => {
                "Internal server error".to_string()
            }
            OzError::LookupFailed(_) => "Temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidRequest => 400,
            ErrorKind::InvalidScope => 400,
            ErrorKind::InvalidClient => 401,
            ErrorKind::IntegrityFailure => 401,
            ErrorKind::DeserializationFailure => 401,
            ErrorKind::MalformedEnvelope => 401,
            ErrorKind::ExpiredCredential => 401,
            ErrorKind::InvalidMac => 401,
            ErrorKind::StaleTimestamp => 401,
            ErrorKind::MismatchedApplication => 401,
            ErrorKind::InvalidEntity => 403,
            ErrorKind::InvalidGrant => 403,
            ErrorKind::DelegationNotAllowed => 403,
            ErrorKind::LookupFailed => 502,
            ErrorKind::Configuration => 500,
            ErrorKind::Internal => 500,
        }
    }
}

impl From<serde_json::Error> for OzError {
    fn from(err: serde_json::Error) -> Self {
        OzError::InternalError(format!("JSON error: {}", err))
    }
}

impl From<tokio::task::JoinError> for OzError {
    fn from(err: tokio::task::JoinError) -> Self {
        OzError::InternalError(format!("Worker task failed: {}", err))
    }
}

impl actix_web::error::ResponseError for OzError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(OzError::status_code(self))
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        let mut response =
            actix_web::HttpResponse::build(actix_web::error::ResponseError::status_code(self));
        if OzError::status_code(self) == 401 {
            response.insert_header(("WWW-Authenticate", crate::SCHEME));
        }

        response.json(serde_json::json!({
            "error": self.code(),
            "message": self.public_message(),
        }))
    }
}
