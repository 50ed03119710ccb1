//! Certificate authorities: a certificate, its signing key and a serial counter.
//!
//! # Hierarchy
//! ```text
//! .               (self-signed root)
//!   └── com.      (issued by the root)
//!       └── coco.com.
//! ```
//!
//! A [`CertificateAuthority`] is active from construction: it either signs
//! its own certificate ([`CertificateAuthority::self_signed`]) or wraps one
//! another authority issued to it ([`CertificateAuthority::from_existing`]).
//!
//! Serial allocation and signing happen under one lock, so concurrent
//! [`CertificateAuthority::process_request`] calls never reuse a serial.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::certificate::{Certificate, CertificateRequest, Validity};
use crate::crypto::{KeySpec, OpensslVerifier, PublicKey, Signer, Verifier};
use crate::error::IssuanceError;
use crate::key_store::SigningKey;
use crate::names::DottedName;
use crate::serial::SerialAllocator;

struct Issuer {
    signer: Box<dyn Signer>,
    serials: SerialAllocator,
}

pub struct CertificateAuthority {
    certificate: Certificate,
    issuer: Mutex<Issuer>,
    verifier: Arc<dyn Verifier>,
}

impl CertificateAuthority {
    /// Self-sign a certificate for `subject_name` with the given key.
    ///
    /// The certificate takes the first serial from `serials`.
    pub fn self_signed(
        subject_name: DottedName,
        not_before: DateTime<Utc>,
        lifetime: Duration,
        signer: Box<dyn Signer>,
        mut serials: SerialAllocator,
    ) -> Result<Self, IssuanceError> {
        let validity = Validity::starting_at(not_before, lifetime);
        if !validity.is_well_formed() {
            return Err(IssuanceError::InvalidValidity {
                subject: subject_name,
            });
        }

        let serial = serials.next();
        let certificate = Certificate::issue(
            serial,
            subject_name.clone(),
            subject_name,
            signer.public_key(),
            validity,
            signer.as_ref(),
        )?;
        tracing::debug!(
            subject = %certificate.subject_name(),
            serial,
            "self-signed authority certificate"
        );

        Ok(Self {
            certificate,
            issuer: Mutex::new(Issuer { signer, serials }),
            verifier: Arc::new(OpensslVerifier),
        })
    }

    /// Generate a key pair and self-sign with it.
    pub fn generate_self_signed(
        subject_name: DottedName,
        not_before: DateTime<Utc>,
        lifetime: Duration,
        key_spec: KeySpec,
        serials: SerialAllocator,
    ) -> Result<Self, IssuanceError> {
        let key = SigningKey::generate(key_spec)?;
        Self::self_signed(subject_name, not_before, lifetime, Box::new(key), serials)
    }

    /// Adopt a certificate issued elsewhere together with its private key.
    pub fn from_existing(
        certificate: Certificate,
        signer: Box<dyn Signer>,
        serials: SerialAllocator,
    ) -> Result<Self, IssuanceError> {
        if signer.public_key() != *certificate.subject_public_key() {
            return Err(IssuanceError::KeyMismatch {
                subject: certificate.subject_name().clone(),
            });
        }
        Ok(Self {
            certificate,
            issuer: Mutex::new(Issuer { signer, serials }),
            verifier: Arc::new(OpensslVerifier),
        })
    }

    /// Replace the verifier used for proof-of-possession checks.
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Turn a request into a certificate signed by this authority
    ///
    /// Consumes one serial number once the request has been accepted, even if
    /// the caller drops the result.
    ///
    /// # Arguments
    /// * `request` - Self-signed request naming the subject and its public key
    /// * `not_before` - Start of the validity window
    /// * `not_after` - End of the validity window, not earlier than `not_before`
    ///
    /// # Returns
    /// * `Result<Certificate, IssuanceError>` - The signed certificate, or
    ///   `InvalidProofOfPossession` / `InvalidValidity` if the request is rejected
    pub fn process_request(
        &self,
        request: CertificateRequest,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Certificate, IssuanceError> {
        if !request.verify_proof_of_possession(self.verifier.as_ref()) {
            tracing::debug!(subject = %request.subject_name(), "rejected request without proof of possession");
            return Err(IssuanceError::InvalidProofOfPossession {
                subject: request.subject_name().clone(),
            });
        }
        let validity = Validity::new(not_before, not_after);
        if !validity.is_well_formed() {
            return Err(IssuanceError::InvalidValidity {
                subject: request.subject_name().clone(),
            });
        }

        let mut issuer = self.issuer.lock();
        let serial = issuer.serials.next();
        let certificate = Certificate::issue(
            serial,
            request.subject_name().clone(),
            self.certificate.subject_name().clone(),
            request.subject_public_key().clone(),
            validity,
            issuer.signer.as_ref(),
        )?;
        drop(issuer);

        tracing::debug!(
            issuer = %self.certificate.subject_name(),
            subject = %certificate.subject_name(),
            serial,
            "issued certificate"
        );
        Ok(certificate)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn subject_name(&self) -> &DottedName {
        self.certificate.subject_name()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.certificate.subject_public_key()
    }

    /// Serial the next issued certificate will carry.
    pub fn next_serial(&self) -> u64 {
        self.issuer.lock().serials.peek()
    }
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("certificate", &self.certificate)
            .field("signing_key", &"<securely stored>")
            .finish()
    }
}
