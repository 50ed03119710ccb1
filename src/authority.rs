//! Naming-facing authorities.
//!
//! An [`Authority`] is *pending* while it only holds a key pair and a
//! certificate request, and *active* once [`Authority::promote`] has wrapped
//! an issued certificate in a [`CertificateAuthority`]. Only active
//! authorities can issue to children or be published.

use chrono::{DateTime, Duration, Utc};

use crate::certificate::{Certificate, CertificateRequest, Validity};
use crate::certificate_authority::CertificateAuthority;
use crate::crypto::{KeySpec, PublicKey};
use crate::error::{IssuanceError, NamingError};
use crate::identity::Identity;
use crate::names::DottedName;
use crate::serial::SerialAllocator;

#[derive(Debug)]
pub struct Authority {
    name: String,
    path: DottedName,
    /// Naming back-reference only; the parent is never owned.
    parent: Option<DottedName>,
    identity: Option<Identity>,
    request: Option<CertificateRequest>,
    ca: Option<CertificateAuthority>,
}

impl Authority {
    /// A self-signed, immediately active authority for `path`.
    pub fn self_signed(
        path: DottedName,
        not_before: DateTime<Utc>,
        lifetime: Duration,
        key_spec: KeySpec,
        serials: SerialAllocator,
    ) -> Result<Self, NamingError> {
        let ca = CertificateAuthority::generate_self_signed(
            path.clone(),
            not_before,
            lifetime,
            key_spec,
            serials,
        )?;
        Ok(Self {
            name: path.leaf().unwrap_or(".").to_string(),
            parent: path.parent(),
            path,
            identity: None,
            request: None,
            ca: Some(ca),
        })
    }

    /// The self-signed authority for `.`.
    pub fn root(
        not_before: DateTime<Utc>,
        lifetime: Duration,
        key_spec: KeySpec,
        serials: SerialAllocator,
    ) -> Result<Self, NamingError> {
        Self::self_signed(DottedName::root(), not_before, lifetime, key_spec, serials)
    }

    /// A pending authority named `name` directly below `parent`.
    pub fn new(name: &str, parent: &DottedName, key_spec: KeySpec) -> Result<Self, NamingError> {
        let path = parent.child(name)?;
        let identity = Identity::generate(path.clone(), key_spec).map_err(IssuanceError::from)?;
        let request = identity.request().map_err(IssuanceError::from)?;
        Ok(Self {
            name: name.to_string(),
            path,
            parent: Some(parent.clone()),
            identity: Some(identity),
            request: Some(request),
            ca: None,
        })
    }

    /// Single path component this authority is published under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full dotted name.
    pub fn path(&self) -> &DottedName {
        &self.path
    }

    pub fn parent_path(&self) -> Option<&DottedName> {
        self.parent.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.ca.is_some()
    }

    /// Outstanding request, present until a parent has issued against it.
    pub fn request(&self) -> Option<&CertificateRequest> {
        self.request.as_ref()
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.ca.as_ref().map(CertificateAuthority::certificate)
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        match (&self.ca, &self.identity) {
            (Some(ca), _) => Some(ca.public_key().clone()),
            (None, Some(identity)) => Some(identity.public_key()),
            (None, None) => None,
        }
    }

    pub fn certificate_authority(&self) -> Option<&CertificateAuthority> {
        self.ca.as_ref()
    }

    /// Issue a certificate for `child`'s outstanding request.
    ///
    /// The child's request is consumed only when issuance succeeds.
    pub fn issue_for(
        &self,
        child: &mut Authority,
        validity: Validity,
    ) -> Result<Certificate, NamingError> {
        let ca = self
            .ca
            .as_ref()
            .ok_or_else(|| NamingError::NotPromoted(self.path.to_string()))?;
        let request = child
            .request
            .clone()
            .ok_or_else(|| NamingError::AlreadyPromoted(child.path.to_string()))?;

        let certificate = ca.process_request(request, validity.not_before, validity.not_after)?;
        child.request = None;
        Ok(certificate)
    }

    /// Become active by adopting a certificate issued for this authority's key.
    pub fn promote(
        &mut self,
        certificate: Certificate,
        serials: SerialAllocator,
    ) -> Result<(), NamingError> {
        if self.ca.is_some() {
            return Err(NamingError::AlreadyPromoted(self.path.to_string()));
        }
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| NamingError::NotPromoted(self.path.to_string()))?;
        if certificate.subject_name() != &self.path {
            return Err(NamingError::NameMismatch {
                path: certificate.subject_name().clone(),
                authority: self.path.to_string(),
            });
        }
        if identity.public_key() != *certificate.subject_public_key() {
            return Err(IssuanceError::KeyMismatch {
                subject: self.path.clone(),
            }
            .into());
        }

        let Some(identity) = self.identity.take() else {
            return Err(NamingError::NotPromoted(self.path.to_string()));
        };
        let ca = CertificateAuthority::from_existing(
            certificate,
            Box::new(identity.into_signer()),
            serials,
        )?;
        tracing::debug!(path = %self.path, "authority promoted");
        self.request = None;
        self.ca = Some(ca);
        Ok(())
    }
}
