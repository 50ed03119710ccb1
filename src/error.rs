//! Error types for issuance, naming and chain verification.
//!
//! Every error is terminal to the operation that raised it. Naming and
//! trust-store failures leave their structure untouched.

use chrono::{DateTime, Utc};

use crate::names::DottedName;
use crate::naming::NodeId;

/// Failures of the underlying key and signature primitives.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

impl From<openssl::error::ErrorStack> for CryptoError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::InvalidKey(e.to_string())
    }
}

/// Failures raised while a certificate authority creates certificates.
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("request for {subject} is not signed by its own key")]
    InvalidProofOfPossession { subject: DottedName },

    #[error("signing key does not match the public key certified for {subject}")]
    KeyMismatch { subject: DottedName },

    #[error("key generation unavailable: {0}")]
    KeyGenerationError(String),

    #[error("validity window for {subject} ends before it starts")]
    InvalidValidity { subject: DottedName },

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl From<CryptoError> for IssuanceError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyGeneration(msg) => Self::KeyGenerationError(msg),
            other => Self::Crypto(other.to_string()),
        }
    }
}

/// Failures of the naming directory and of authority promotion.
#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("certificate for {path} is not signed by the authority at {parent}")]
    UnauthorizedPublish { path: DottedName, parent: DottedName },

    #[error("parent path {0} is not published")]
    UnknownParentPath(DottedName),

    #[error("{0} not found")]
    NotFound(DottedName),

    #[error("{0:?} does not belong to this directory")]
    UnknownNode(NodeId),

    #[error("{0} is already published")]
    AlreadyPublished(DottedName),

    #[error("authority {0} has no certificate yet")]
    NotPromoted(String),

    #[error("authority {0} is already promoted")]
    AlreadyPromoted(String),

    #[error("authority named {authority} cannot be published at {path}")]
    NameMismatch { path: DottedName, authority: String },

    #[error("invalid dotted name {0:?}")]
    InvalidName(String),

    #[error("parent chain of {0} loops back on itself")]
    CycleDetected(String),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}

/// Failures of trust-store chain construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("no candidate issuer named {issuer} for {subject}")]
    IssuerNotFound { subject: DottedName, issuer: DottedName },

    #[error("signature on {subject} does not verify under any certificate named {issuer}")]
    SignatureMismatch { subject: DottedName, issuer: DottedName },

    #[error("chain from {subject} exceeds {max_depth} links")]
    ChainTooLong { subject: DottedName, max_depth: usize },

    #[error("{subject} expired at {valid_to}")]
    Expired {
        subject: DottedName,
        valid_to: DateTime<Utc>,
    },

    #[error("{subject} is not valid before {valid_from}")]
    NotYetValid {
        subject: DottedName,
        valid_from: DateTime<Utc>,
    },

    #[error("self-signed {subject} is not a trust anchor")]
    UntrustedRoot { subject: DottedName },
}

/// Umbrella error for callers that drive several components at once.
#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}
