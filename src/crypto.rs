//! Signing and verification capabilities.
//!
//! The certificate core only ever sees [`Signer`], [`Verifier`] and opaque
//! [`PublicKey`] handles. The default implementations use OpenSSL with
//! SHA-256 digests over RSA or ECDSA P-256 keys.

use std::fmt;

use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Smallest RSA modulus accepted by the key generator.
pub const RSA_KEY_SIZE_MIN: u32 = 2048;
pub const RSA_KEY_SIZE_DEFAULT: u32 = 2048;

/// Key family requested from the key generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyFamily {
    Rsa,
    EcP256,
}

/// Key family plus parameter size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub family: KeyFamily,
    /// Modulus size for RSA; ignored for fixed-curve families.
    pub bits: u32,
}

impl KeySpec {
    pub fn rsa(bits: u32) -> Self {
        Self {
            family: KeyFamily::Rsa,
            bits,
        }
    }

    pub fn ec_p256() -> Self {
        Self {
            family: KeyFamily::EcP256,
            bits: 256,
        }
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::ec_p256()
    }
}

/// Opaque public key handle: DER-encoded SubjectPublicKeyInfo.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    der: Vec<u8>,
}

impl PublicKey {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Lowercase hex SHA-256 of the DER bytes.
    pub fn fingerprint(&self) -> String {
        hex_digest(&self.der)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fp = self.fingerprint();
        f.debug_tuple("PublicKey").field(&&fp[..16]).finish()
    }
}

/// Produces signatures with one private key.
pub trait Signer: Send + Sync {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Public half of the key this signer uses.
    fn public_key(&self) -> PublicKey;
}

/// Checks signatures against a public key.
pub trait Verifier: Send + Sync {
    fn verify(&self, data: &[u8], signature: &[u8], key: &PublicKey) -> bool;
}

/// SHA-256 digest verification through OpenSSL.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpensslVerifier;

impl Verifier for OpensslVerifier {
    fn verify(&self, data: &[u8], signature: &[u8], key: &PublicKey) -> bool {
        let pkey = match PKey::public_key_from_der(key.as_der()) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let mut verifier = match openssl::sign::Verifier::new(MessageDigest::sha256(), &pkey) {
            Ok(v) => v,
            Err(_) => return false,
        };
        verifier.verify_oneshot(signature, data).unwrap_or(false)
    }
}

pub(crate) fn hex_digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_store::SigningKey;

    #[test]
    fn sign_verify_round_trip() {
        let key = SigningKey::generate(KeySpec::ec_p256()).unwrap();
        let data = b"certificate body";
        let signature = key.sign(data).unwrap();
        assert!(OpensslVerifier.verify(data, &signature, &key.public_key()));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let key1 = SigningKey::generate(KeySpec::ec_p256()).unwrap();
        let key2 = SigningKey::generate(KeySpec::ec_p256()).unwrap();
        let signature = key1.sign(b"data").unwrap();
        assert!(!OpensslVerifier.verify(b"data", &signature, &key2.public_key()));
    }

    #[test]
    fn tampered_data_fails_verification() {
        let key = SigningKey::generate(KeySpec::ec_p256()).unwrap();
        let signature = key.sign(b"original").unwrap();
        assert!(!OpensslVerifier.verify(b"tampered", &signature, &key.public_key()));
    }

    #[test]
    fn garbage_key_returns_false() {
        let key = PublicKey::from_der(vec![1, 2, 3]);
        assert!(!OpensslVerifier.verify(b"data", &[0u8; 64], &key));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let key = PublicKey::from_der(b"abc".to_vec());
        let fp = key.fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.starts_with("ba7816bf"));
    }
}
