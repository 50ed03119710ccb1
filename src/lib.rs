//! PKI Tree - certificate authority hierarchy with signature-gated naming
//!
//! A small Public Key Infrastructure core built from three cooperating pieces:
//!
//! ```text
//! . (self-signed root)
//!   └── com.            (issued by .)
//!       └── coco.com.   (issued by com.)
//!           └── frank.coco.com.
//! ```
//!
//! - **Issuance**: a [`CertificateAuthority`] turns self-signed
//!   [`CertificateRequest`]s into [`Certificate`]s, numbering them with its own
//!   [`SerialAllocator`].
//! - **Naming**: a [`NamingDirectory`] binds dotted names to [`Authority`]
//!   values and only accepts a name when its certificate is signed by the
//!   authority published at the parent name.
//! - **Validation**: a [`TrustStore`] builds a chain from any certificate to a
//!   configured trust anchor through a pool of untrusted intermediates, using
//!   certificate content only.
//!
//! Key generation, signing and verification go through the [`Signer`] and
//! [`Verifier`] traits; OpenSSL-backed implementations are provided.
//!
//! # Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use pki_tree::{
//!     Authority, DottedName, KeySpec, NamingDirectory, SerialAllocator, TrustStore, Validity,
//! };
//!
//! fn build() -> Result<(), pki_tree::PkiError> {
//!     let directory = NamingDirectory::new();
//!
//!     let root = Authority::root(
//!         Utc::now(),
//!         Duration::days(3650),
//!         KeySpec::ec_p256(),
//!         SerialAllocator::default(),
//!     )?;
//!     let root_cert = root.certificate().cloned();
//!     directory.publish(&DottedName::root(), root)?;
//!
//!     let mut com = Authority::new("com", &DottedName::root(), KeySpec::ec_p256())?;
//!     let issued = directory
//!         .lookup(&DottedName::root())?
//!         .issue_for(&mut com, Validity::days_from_now(1825))?;
//!     com.promote(issued.clone(), SerialAllocator::default())?;
//!     directory.publish(&DottedName::parse("com.")?, com)?;
//!
//!     let store = TrustStore::new();
//!     if let Some(root_cert) = root_cert {
//!         store.add_trusted(root_cert);
//!     }
//!     store.verify(&issued)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Each component reports a typed error ([`IssuanceError`], [`NamingError`],
//! [`VerificationError`]); [`PkiError`] wraps them all. Failed publishes and
//! failed verifications never mutate the directory or the store.

pub mod authority;
pub mod certificate;
pub mod certificate_authority;
pub mod configs;
pub mod crypto;
mod encoding;
pub mod error;
pub mod identity;
pub mod key_store;
pub mod names;
pub mod naming;
pub mod serial;
pub mod trust_store;

pub use authority::Authority;
pub use certificate::{Certificate, CertificateRequest, Validity};
pub use certificate_authority::CertificateAuthority;
pub use configs::PkiConfig;
pub use crypto::{KeyFamily, KeySpec, OpensslVerifier, PublicKey, Signer, Verifier};
pub use error::{CryptoError, IssuanceError, NamingError, PkiError, VerificationError};
pub use identity::Identity;
pub use key_store::SigningKey;
pub use names::DottedName;
pub use naming::{NamingDirectory, NodeId};
pub use serial::SerialAllocator;
pub use trust_store::{RootPolicy, TrustOptions, TrustStore};
