//! Error types and stable error kinds.
//!
//! Every store, snapshot and auth operation reports failures as a
//! [`CofferError`]. Gateways branch on [`CofferError::kind`], whose string
//! identifiers are part of the API contract and never change meaning.

use thiserror::Error;

/// Common Coffer error conditions.
#[derive(Debug, Error)]
pub enum CofferError {
    /// Tenant has no record in the tenant table.
    #[error("tenant '{tenant_id}' not found")]
    TenantNotFound { tenant_id: String },

    /// Key is absent from the tenant namespace.
    #[error("key '{key}' not found")]
    KeyNotFound { key: String },

    /// Key existed but its expiry instant has passed. Reported as not-found.
    #[error("key '{key}' expired")]
    KeyExpired { key: String },

    /// Blob write would push the tenant over its tier limit.
    #[error("storage quota exceeded: {requested} bytes requested, {available} of {limit} bytes available")]
    QuotaExceeded {
        requested: u64,
        available: u64,
        limit: u64,
    },

    /// Declared type cannot parse the supplied input.
    #[error("type conversion error: cannot convert to {declared}: {message}")]
    TypeConversion { declared: String, message: String },

    /// Subscription tier name is not recognized.
    #[error("invalid subscription tier '{tier}'")]
    InvalidTier { tier: String },

    /// Subscription change would leave usage above the new limit.
    #[error("cannot switch to {tier}: storage used ({usage} bytes) exceeds tier limit ({limit} bytes)")]
    QuotaViolation { tier: String, usage: u64, limit: u64 },

    /// Global tenant ceiling reached.
    #[error("tenant limit reached (max {max_tenants} tenants)")]
    TooManyTenants { max_tenants: usize },

    /// Signed request rejected.
    #[error("authentication failed: {reason}")]
    AuthFailure { reason: AuthFailureReason },

    /// Snapshot bytes are unparseable or carry an unknown version.
    #[error("snapshot format error: {message}")]
    SnapshotFormat { message: String },

    /// Invalid request.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Why a signed request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureReason {
    /// No tenant with the claimed id.
    UnknownTenant,
    /// Tenant exists but never registered a public key.
    NotRegistered,
    /// Supplied public key differs from the registered one.
    PublicKeyMismatch,
    /// Supplied salt is not the tenant's current unconsumed salt.
    StaleSalt,
    /// Signature does not verify against the canonical body and salt.
    BadSignature,
    /// Envelope fields could not be decoded.
    MalformedEnvelope,
}

impl std::fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTenant => write!(f, "UnknownTenant"),
            Self::NotRegistered => write!(f, "NotRegistered"),
            Self::PublicKeyMismatch => write!(f, "PublicKeyMismatch"),
            Self::StaleSalt => write!(f, "StaleSalt"),
            Self::BadSignature => write!(f, "BadSignature"),
            Self::MalformedEnvelope => write!(f, "MalformedEnvelope"),
        }
    }
}

/// Stable error taxonomy exposed to gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    QuotaExceeded,
    TypeConversionError,
    InvalidTier,
    QuotaViolation,
    TooManyTenants,
    AuthFailure,
    SnapshotFormatError,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    /// Stable string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::TypeConversionError => "TypeConversionError",
            Self::InvalidTier => "InvalidTier",
            Self::QuotaViolation => "QuotaViolation",
            Self::TooManyTenants => "TooManyTenants",
            Self::AuthFailure => "AuthFailure",
            Self::SnapshotFormatError => "SnapshotFormatError",
            Self::InvalidRequest => "InvalidRequest",
            Self::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CofferError {
    /// Create a TenantNotFound error.
    pub fn tenant_not_found(tenant_id: impl Into<String>) -> Self {
        Self::TenantNotFound {
            tenant_id: tenant_id.into(),
        }
    }

    /// Create a KeyNotFound error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Create a TypeConversion error.
    pub fn type_conversion(declared: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeConversion {
            declared: declared.into(),
            message: message.into(),
        }
    }

    /// Create an AuthFailure error.
    pub fn auth(reason: AuthFailureReason) -> Self {
        Self::AuthFailure { reason }
    }

    /// Create a SnapshotFormat error.
    pub fn snapshot_format(message: impl Into<String>) -> Self {
        Self::SnapshotFormat {
            message: message.into(),
        }
    }

    /// Create an InvalidRequest error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Map this error onto the stable taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TenantNotFound { .. } | Self::KeyNotFound { .. } | Self::KeyExpired { .. } => {
                ErrorKind::NotFound
            }
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::TypeConversion { .. } => ErrorKind::TypeConversionError,
            Self::InvalidTier { .. } => ErrorKind::InvalidTier,
            Self::QuotaViolation { .. } => ErrorKind::QuotaViolation,
            Self::TooManyTenants { .. } => ErrorKind::TooManyTenants,
            Self::AuthFailure { .. } => ErrorKind::AuthFailure,
            Self::SnapshotFormat { .. } => ErrorKind::SnapshotFormatError,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error reports a missing or expired tenant/key.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The auth failure reason, if this is an auth failure.
    pub fn auth_reason(&self) -> Option<AuthFailureReason> {
        match self {
            Self::AuthFailure { reason } => Some(*reason),
            _ => None,
        }
    }
}

/// Result type using CofferError.
pub type CofferResult<T> = Result<T, CofferError>;
