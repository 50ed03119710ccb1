//! Content-based certificate path validation.
//!
//! A [`TrustStore`] holds trust anchors and a pool of untrusted candidate
//! issuers. [`TrustStore::verify`] builds a chain from a leaf towards an
//! anchor using only certificate content: issuer name, subject name, public
//! key and signature. It knows nothing about the naming directory.
//!
//! # Chain construction
//! ```text
//! leaf ── issuer name ──▶ candidates named like the issuer
//!                         │ signature verifies?  no → next candidate
//!                         ▼ yes
//!                         recurse until an anchor is reached
//! ```
//!
//! Candidates sharing a subject name are tried in insertion order with
//! backtracking, so a look-alike certificate whose signature does not verify
//! never hides the genuine issuer. A candidate already on the chain being
//! built is never followed again, and a certificate that failed once is not
//! searched again from the same depth, so issuer/subject cycles end in
//! [`VerificationError::ChainTooLong`] after visiting each certificate once.
//! Chain length is also bounded by the pool size plus one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::certificate::Certificate;
use crate::crypto::{OpensslVerifier, Verifier};
use crate::error::VerificationError;

/// What to do with a self-signed certificate that is not a trust anchor.
///
/// Either way, a self-signed certificate that is in neither pool fails with
/// [`VerificationError::IssuerNotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootPolicy {
    /// Accept a self-signed certificate found in the untrusted pool as a root:
    /// membership in the pool is what makes it trusted.
    #[default]
    PoolSelfSigned,
    /// Only anchors terminate a chain. A pooled self-signed certificate fails
    /// with [`VerificationError::UntrustedRoot`].
    AnchorsOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustOptions {
    /// Reject certificates whose validity window excludes the check time.
    pub check_validity: bool,
    pub root_policy: RootPolicy,
    /// Overrides the pool-derived bound on chain hops.
    pub max_chain_depth: Option<usize>,
}

impl Default for TrustOptions {
    fn default() -> Self {
        Self {
            check_validity: true,
            root_policy: RootPolicy::default(),
            max_chain_depth: None,
        }
    }
}

#[derive(Debug)]
struct PoolEntry {
    fingerprint: String,
    certificate: Certificate,
}

/// Insertion-ordered set of certificates keyed by fingerprint.
#[derive(Debug, Default)]
struct Pool {
    entries: Vec<PoolEntry>,
    fingerprints: HashSet<String>,
}

impl Pool {
    fn insert(&mut self, certificate: Certificate) -> bool {
        let fingerprint = certificate.fingerprint();
        if !self.fingerprints.insert(fingerprint.clone()) {
            return false;
        }
        self.entries.push(PoolEntry {
            fingerprint,
            certificate,
        });
        true
    }

    fn remove(&mut self, certificate: &Certificate) -> bool {
        let fingerprint = certificate.fingerprint();
        if !self.fingerprints.remove(&fingerprint) {
            return false;
        }
        self.entries.retain(|entry| entry.fingerprint != fingerprint);
        true
    }

    fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
struct Pools {
    anchors: Pool,
    untrusted: Pool,
}

pub struct TrustStore {
    pools: RwLock<Pools>,
    verifier: Arc<dyn Verifier>,
    options: TrustOptions,
}

/// Per-call state threaded through the recursive search.
struct Search<'a> {
    pools: &'a Pools,
    now: DateTime<Utc>,
    max_depth: usize,
    chain: Vec<Certificate>,
    /// Fingerprints of the certificates currently on `chain`.
    on_path: HashSet<String>,
    /// Certificates that already failed, with the depth they failed at.
    failed: HashMap<String, (usize, VerificationError)>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::with_options(TrustOptions::default())
    }

    pub fn with_options(options: TrustOptions) -> Self {
        Self {
            pools: RwLock::new(Pools::default()),
            verifier: Arc::new(OpensslVerifier),
            options,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn options(&self) -> &TrustOptions {
        &self.options
    }

    /// Add a trust anchor. Returns `false` if it was already present.
    pub fn add_trusted(&self, certificate: Certificate) -> bool {
        tracing::debug!(subject = %certificate.subject_name(), "adding trust anchor");
        self.pools.write().anchors.insert(certificate)
    }

    /// Add a candidate intermediate. Returns `false` if it was already present.
    pub fn add_untrusted(&self, certificate: Certificate) -> bool {
        tracing::debug!(subject = %certificate.subject_name(), "adding untrusted certificate");
        self.pools.write().untrusted.insert(certificate)
    }

    pub fn remove_trusted(&self, certificate: &Certificate) -> bool {
        self.pools.write().anchors.remove(certificate)
    }

    /// Drop a certificate from the untrusted pool, e.g. to revoke it.
    pub fn remove_untrusted(&self, certificate: &Certificate) -> bool {
        self.pools.write().untrusted.remove(certificate)
    }

    pub fn contains_trusted(&self, certificate: &Certificate) -> bool {
        self.pools
            .read()
            .anchors
            .contains_fingerprint(&certificate.fingerprint())
    }

    pub fn contains_untrusted(&self, certificate: &Certificate) -> bool {
        self.pools
            .read()
            .untrusted
            .contains_fingerprint(&certificate.fingerprint())
    }

    pub fn trusted_count(&self) -> usize {
        self.pools.read().anchors.len()
    }

    pub fn untrusted_count(&self) -> usize {
        self.pools.read().untrusted.len()
    }

    /// Validate `certificate` against the anchors at the current time
    ///
    /// Builds a chain from `certificate` through the untrusted pool to a
    /// trust anchor. Neither pool is modified.
    ///
    /// # Arguments
    /// * `certificate` - The certificate to validate; it need not be in either pool
    ///
    /// # Returns
    /// * `Ok(())` if a chain to an anchor (or, under
    ///   [`RootPolicy::PoolSelfSigned`], to a pooled self-signed root) exists
    /// * `Err(VerificationError)` describing the most relevant failure otherwise
    pub fn verify(&self, certificate: &Certificate) -> Result<(), VerificationError> {
        self.verify_at(certificate, Utc::now())
    }

    /// Validate `certificate` as of `now`.
    pub fn verify_at(
        &self,
        certificate: &Certificate,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        self.build_chain(certificate, now).map(|_| ())
    }

    /// Validate `certificate` and return the chain, leaf first, anchor last.
    pub fn verify_chain(
        &self,
        certificate: &Certificate,
    ) -> Result<Vec<Certificate>, VerificationError> {
        self.build_chain(certificate, Utc::now())
    }

    fn build_chain(
        &self,
        certificate: &Certificate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Certificate>, VerificationError> {
        let pools = self.pools.read();
        let max_depth = self
            .options
            .max_chain_depth
            .unwrap_or(pools.untrusted.len() + 1);
        let mut search = Search {
            pools: &pools,
            now,
            max_depth,
            chain: Vec::new(),
            on_path: HashSet::new(),
            failed: HashMap::new(),
        };

        let fingerprint = certificate.fingerprint();
        match self.extend(&mut search, certificate, &fingerprint, 0) {
            Ok(()) => {
                tracing::debug!(
                    subject = %certificate.subject_name(),
                    hops = search.chain.len() - 1,
                    "certificate verified"
                );
                Ok(search.chain)
            }
            Err(e) => {
                tracing::debug!(subject = %certificate.subject_name(), error = %e, "verification failed");
                Err(e)
            }
        }
    }

    /// Extend the chain in `search` from `certificate`, `depth` hops from the leaf.
    ///
    /// A certificate that already failed at this depth or a shallower one
    /// fails again without being expanded.
    fn extend(
        &self,
        search: &mut Search<'_>,
        certificate: &Certificate,
        fingerprint: &str,
        depth: usize,
    ) -> Result<(), VerificationError> {
        if let Some((failed_at, error)) = search.failed.get(fingerprint) {
            if depth >= *failed_at {
                return Err(error.clone());
            }
        }
        let result = self.expand(search, certificate, fingerprint, depth);
        if let Err(e) = &result {
            search
                .failed
                .insert(fingerprint.to_string(), (depth, e.clone()));
        }
        result
    }

    fn expand(
        &self,
        search: &mut Search<'_>,
        certificate: &Certificate,
        fingerprint: &str,
        depth: usize,
    ) -> Result<(), VerificationError> {
        if depth > search.max_depth {
            return Err(VerificationError::ChainTooLong {
                subject: certificate.subject_name().clone(),
                max_depth: search.max_depth,
            });
        }
        if self.options.check_validity {
            certificate.check_validity_at(search.now)?;
        }

        if search.pools.anchors.contains_fingerprint(fingerprint) {
            search.chain.push(certificate.clone());
            return Ok(());
        }

        if certificate.is_self_signed(self.verifier.as_ref()) {
            if !search.pools.untrusted.contains_fingerprint(fingerprint) {
                return Err(VerificationError::IssuerNotFound {
                    subject: certificate.subject_name().clone(),
                    issuer: certificate.issuer_name().clone(),
                });
            }
            return match self.options.root_policy {
                RootPolicy::PoolSelfSigned => {
                    search.chain.push(certificate.clone());
                    Ok(())
                }
                RootPolicy::AnchorsOnly => Err(VerificationError::UntrustedRoot {
                    subject: certificate.subject_name().clone(),
                }),
            };
        }

        let pools = search.pools;
        let candidates: Vec<&PoolEntry> = pools
            .untrusted
            .entries
            .iter()
            .chain(
                pools
                    .anchors
                    .entries
                    .iter()
                    .filter(|entry| !pools.untrusted.contains_fingerprint(&entry.fingerprint)),
            )
            .filter(|entry| entry.certificate.subject_name() == certificate.issuer_name())
            .collect();

        if candidates.is_empty() {
            return Err(VerificationError::IssuerNotFound {
                subject: certificate.subject_name().clone(),
                issuer: certificate.issuer_name().clone(),
            });
        }

        search.chain.push(certificate.clone());
        search.on_path.insert(fingerprint.to_string());
        let mark = search.chain.len();
        let mut failure: Option<VerificationError> = None;

        for candidate in candidates {
            let issuer = &candidate.certificate;
            if !certificate.verify_signature(issuer.subject_public_key(), self.verifier.as_ref()) {
                tracing::trace!(
                    subject = %certificate.subject_name(),
                    candidate_serial = issuer.serial_number(),
                    "candidate issuer signature mismatch"
                );
                continue;
            }
            let outcome = if search.on_path.contains(&candidate.fingerprint) {
                tracing::trace!(
                    subject = %certificate.subject_name(),
                    candidate_serial = issuer.serial_number(),
                    "candidate issuer already on the chain"
                );
                Err(VerificationError::ChainTooLong {
                    subject: issuer.subject_name().clone(),
                    max_depth: search.max_depth,
                })
            } else {
                self.extend(search, issuer, &candidate.fingerprint, depth + 1)
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(e) => {
                    search.chain.truncate(mark);
                    failure = Some(match failure {
                        Some(previous @ VerificationError::ChainTooLong { .. }) => previous,
                        Some(previous) if !matches!(e, VerificationError::ChainTooLong { .. }) => {
                            previous
                        }
                        _ => e,
                    });
                }
            }
        }

        search.on_path.remove(fingerprint);
        search.chain.pop();
        Err(failure.unwrap_or_else(|| VerificationError::SignatureMismatch {
            subject: certificate.subject_name().clone(),
            issuer: certificate.issuer_name().clone(),
        }))
    }
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::new()
    }
}
