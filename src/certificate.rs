//! Signed certificates and self-signed certificate requests.

use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{hex_digest, PublicKey, Signer, Verifier};
use crate::encoding::{FieldEncoder, CERTIFICATE_DOMAIN, REQUEST_DOMAIN};
use crate::error::{CryptoError, VerificationError};
use crate::names::DottedName;

const PEM_TAG: &str = "PKI TREE CERTIFICATE";

/// Inclusive validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl Validity {
    /// Window starting at `not_before`, truncated to whole seconds.
    pub fn new(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        Self {
            not_before: whole_seconds(not_before),
            not_after: whole_seconds(not_after),
        }
    }

    pub fn starting_at(not_before: DateTime<Utc>, lifetime: Duration) -> Self {
        Self::new(not_before, not_before + lifetime)
    }

    /// Window starting now and lasting `days`.
    pub fn days_from_now(days: u32) -> Self {
        Self::starting_at(Utc::now(), Duration::days(i64::from(days)))
    }

    pub fn is_well_formed(&self) -> bool {
        self.not_before <= self.not_after
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

fn whole_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_nanosecond(0).unwrap_or(t)
}

/// Immutable signed binding of a subject name and public key to an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Certificate {
    serial_number: u64,
    subject_name: DottedName,
    issuer_name: DottedName,
    subject_public_key: PublicKey,
    validity: Validity,
    signature: Vec<u8>,
}

impl Certificate {
    /// Build and sign a certificate. `signer` holds the issuer's key.
    pub(crate) fn issue(
        serial_number: u64,
        subject_name: DottedName,
        issuer_name: DottedName,
        subject_public_key: PublicKey,
        validity: Validity,
        signer: &dyn Signer,
    ) -> Result<Self, CryptoError> {
        let mut certificate = Self {
            serial_number,
            subject_name,
            issuer_name,
            subject_public_key,
            validity,
            signature: Vec::new(),
        };
        certificate.signature = signer.sign(&certificate.signed_fields())?;
        Ok(certificate)
    }

    pub fn serial_number(&self) -> u64 {
        self.serial_number
    }

    pub fn subject_name(&self) -> &DottedName {
        &self.subject_name
    }

    pub fn issuer_name(&self) -> &DottedName {
        &self.issuer_name
    }

    pub fn subject_public_key(&self) -> &PublicKey {
        &self.subject_public_key
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Bytes covered by the signature: serial, subject, issuer, key and validity.
    pub fn signed_fields(&self) -> Vec<u8> {
        let mut encoder = FieldEncoder::new(CERTIFICATE_DOMAIN);
        encoder
            .u64(self.serial_number)
            .str(&self.subject_name.to_string())
            .str(&self.issuer_name.to_string())
            .bytes(self.subject_public_key.as_der())
            .i64(self.validity.not_before.timestamp())
            .i64(self.validity.not_after.timestamp());
        encoder.finish()
    }

    pub fn verify_signature(&self, issuer_key: &PublicKey, verifier: &dyn Verifier) -> bool {
        verifier.verify(&self.signed_fields(), &self.signature, issuer_key)
    }

    /// Subject and issuer carry the same name.
    pub fn is_self_issued(&self) -> bool {
        self.subject_name == self.issuer_name
    }

    /// Self-issued and signed by its own key.
    pub fn is_self_signed(&self, verifier: &dyn Verifier) -> bool {
        self.is_self_issued() && self.verify_signature(&self.subject_public_key, verifier)
    }

    /// Content identity: SHA-256 over the signed fields and the signature.
    pub fn fingerprint(&self) -> String {
        let mut content = self.signed_fields();
        content.extend_from_slice(&self.signature);
        hex_digest(&content)
    }

    /// Check `instant` against the validity window.
    pub fn check_validity_at(&self, instant: DateTime<Utc>) -> Result<(), VerificationError> {
        if instant < self.validity.not_before {
            return Err(VerificationError::NotYetValid {
                subject: self.subject_name.clone(),
                valid_from: self.validity.not_before,
            });
        }
        if instant > self.validity.not_after {
            return Err(VerificationError::Expired {
                subject: self.subject_name.clone(),
                valid_to: self.validity.not_after,
            });
        }
        Ok(())
    }

    /// PEM armour of the signed body and signature, for display.
    pub fn to_pem(&self) -> String {
        let mut encoder = FieldEncoder::new(CERTIFICATE_DOMAIN);
        encoder.bytes(&self.signed_fields()).bytes(&self.signature);
        pem::encode(&pem::Pem::new(PEM_TAG, encoder.finish()))
    }

    #[cfg(test)]
    pub(crate) fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} issued by {} ({} .. {})",
            self.serial_number,
            self.subject_name,
            self.issuer_name,
            self.validity.not_before.format("%Y-%m-%d"),
            self.validity.not_after.format("%Y-%m-%d"),
        )
    }
}

/// Proof that the holder of a key pair wants it certified under a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    subject_name: DottedName,
    subject_public_key: PublicKey,
    signature: Vec<u8>,
}

impl CertificateRequest {
    /// Create a request signed with the key being certified.
    pub fn new(subject_name: DottedName, signer: &dyn Signer) -> Result<Self, CryptoError> {
        let subject_public_key = signer.public_key();
        let signature = signer.sign(&Self::encode(&subject_name, &subject_public_key))?;
        Ok(Self {
            subject_name,
            subject_public_key,
            signature,
        })
    }

    pub fn subject_name(&self) -> &DottedName {
        &self.subject_name
    }

    pub fn subject_public_key(&self) -> &PublicKey {
        &self.subject_public_key
    }

    /// The signature verifies under the requested public key.
    pub fn verify_proof_of_possession(&self, verifier: &dyn Verifier) -> bool {
        verifier.verify(
            &Self::encode(&self.subject_name, &self.subject_public_key),
            &self.signature,
            &self.subject_public_key,
        )
    }

    fn encode(subject_name: &DottedName, key: &PublicKey) -> Vec<u8> {
        let mut encoder = FieldEncoder::new(REQUEST_DOMAIN);
        encoder.str(&subject_name.to_string()).bytes(key.as_der());
        encoder.finish()
    }

    #[cfg(test)]
    pub(crate) fn with_subject_public_key(mut self, key: PublicKey) -> Self {
        self.subject_public_key = key;
        self
    }
}
