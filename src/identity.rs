//! A named key pair that can ask to be certified.

use crate::certificate::CertificateRequest;
use crate::crypto::{KeySpec, PublicKey, Signer};
use crate::error::CryptoError;
use crate::key_store::SigningKey;
use crate::names::DottedName;

#[derive(Debug)]
pub struct Identity {
    subject_name: DottedName,
    key: SigningKey,
}

impl Identity {
    pub fn new(subject_name: DottedName, key: SigningKey) -> Self {
        Self { subject_name, key }
    }

    /// Generate a fresh key pair for `subject_name`.
    pub fn generate(subject_name: DottedName, key_spec: KeySpec) -> Result<Self, CryptoError> {
        Ok(Self::new(subject_name, SigningKey::generate(key_spec)?))
    }

    pub fn subject_name(&self) -> &DottedName {
        &self.subject_name
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Self-signed request for a certificate binding this key to the name.
    pub fn request(&self) -> Result<CertificateRequest, CryptoError> {
        CertificateRequest::new(self.subject_name.clone(), &self.key)
    }

    pub fn into_signer(self) -> SigningKey {
        self.key
    }
}
