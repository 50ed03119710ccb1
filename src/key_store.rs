//! Private key container built on the secrecy crate.
//!
//! Key material stays DER-encoded inside a [`Secret`], is zeroized on drop,
//! and is only turned back into an OpenSSL key for the duration of a
//! signing call.

use std::fmt;

use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use secrecy::zeroize::Zeroize;
use secrecy::{ExposeSecret, Secret};

use crate::crypto::{KeyFamily, KeySpec, PublicKey, Signer, RSA_KEY_SIZE_MIN};
use crate::error::CryptoError;

struct SecurePrivateKey {
    der_bytes: Vec<u8>,
}

impl Zeroize for SecurePrivateKey {
    fn zeroize(&mut self) {
        self.der_bytes.zeroize();
    }
}

/// A private signing key held in secret storage.
pub struct SigningKey {
    private_key: Secret<SecurePrivateKey>,
    public_key: PublicKey,
    family: KeyFamily,
}

impl SigningKey {
    /// Generate a fresh key pair of the requested family and size.
    pub fn generate(spec: KeySpec) -> Result<Self, CryptoError> {
        let pkey = match spec.family {
            KeyFamily::Rsa => {
                if spec.bits < RSA_KEY_SIZE_MIN {
                    return Err(CryptoError::KeyGeneration(format!(
                        "RSA modulus of {} bits is below the {} bit minimum",
                        spec.bits, RSA_KEY_SIZE_MIN
                    )));
                }
                let rsa = Rsa::generate(spec.bits)
                    .map_err(|e| CryptoError::KeyGeneration(format!("RSA keypair: {e}")))?;
                PKey::from_rsa(rsa)
                    .map_err(|e| CryptoError::KeyGeneration(format!("RSA private key: {e}")))?
            }
            KeyFamily::EcP256 => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)
                    .map_err(|e| CryptoError::KeyGeneration(format!("P-256 group: {e}")))?;
                let ec = EcKey::generate(&group)
                    .map_err(|e| CryptoError::KeyGeneration(format!("P-256 keypair: {e}")))?;
                PKey::from_ec_key(ec)
                    .map_err(|e| CryptoError::KeyGeneration(format!("P-256 private key: {e}")))?
            }
        };
        tracing::trace!(family = ?spec.family, bits = spec.bits, "generated key pair");
        Self::from_pkey(&pkey)
    }

    /// Take ownership of an existing OpenSSL key.
    pub fn from_pkey(key: &PKey<Private>) -> Result<Self, CryptoError> {
        let family = match key.id() {
            openssl::pkey::Id::RSA => KeyFamily::Rsa,
            openssl::pkey::Id::EC => {
                let curve = key.ec_key()?.group().curve_name();
                if curve != Some(Nid::X9_62_PRIME256V1) {
                    return Err(CryptoError::InvalidKey(format!(
                        "unsupported EC curve {curve:?}, expected P-256"
                    )));
                }
                KeyFamily::EcP256
            }
            other => {
                return Err(CryptoError::InvalidKey(format!(
                    "unsupported key type {other:?}"
                )))
            }
        };
        let der_bytes = key.private_key_to_der()?;
        let public_key = PublicKey::from_der(key.public_key_to_der()?);
        Ok(Self {
            private_key: Secret::new(SecurePrivateKey { der_bytes }),
            public_key,
            family,
        })
    }

    /// Load a PEM-encoded private key, optionally passphrase protected.
    pub fn from_pem(pem: &[u8], passphrase: Option<&str>) -> Result<Self, CryptoError> {
        let key = match passphrase {
            Some(pwd) => PKey::private_key_from_pem_passphrase(pem, pwd.as_bytes())?,
            None => PKey::private_key_from_pem(pem)?,
        };
        Self::from_pkey(&key)
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    fn to_pkey(&self) -> Result<PKey<Private>, CryptoError> {
        let der_bytes = &self.private_key.expose_secret().der_bytes;
        PKey::private_key_from_der(der_bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("reconstructing private key: {e}")))
    }
}

impl Signer for SigningKey {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let pkey = self.to_pkey()?;
        let mut signer = openssl::sign::Signer::new(MessageDigest::sha256(), &pkey)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        signer
            .sign_oneshot_to_vec(data)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("family", &self.family)
            .field("public_key", &self.public_key)
            .field("private_key", &"<securely stored>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{OpensslVerifier, Verifier};

    #[test]
    fn debug_does_not_leak() {
        let key = SigningKey::generate(KeySpec::ec_p256()).unwrap();
        let debug_str = format!("{:?}", key);
        assert!(!debug_str.contains("der_bytes"));
        assert!(debug_str.contains("securely stored"));
    }

    #[test]
    fn rsa_keys_sign() {
        let key = SigningKey::generate(KeySpec::rsa(2048)).unwrap();
        assert_eq!(key.family(), KeyFamily::Rsa);
        let sig = key.sign(b"payload").unwrap();
        assert!(OpensslVerifier.verify(b"payload", &sig, &key.public_key()));
    }

    #[test]
    fn undersized_rsa_is_rejected() {
        let err = SigningKey::generate(KeySpec::rsa(1024)).unwrap_err();
        assert!(matches!(err, CryptoError::KeyGeneration(_)));
    }

    #[test]
    fn non_p256_curves_are_rejected() {
        let ec = EcKey::generate(&EcGroup::from_curve_name(Nid::SECP384R1).unwrap()).unwrap();
        let pkey = PKey::from_ec_key(ec).unwrap();
        let err = SigningKey::from_pkey(&pkey).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[test]
    fn pem_round_trip_keeps_public_key() {
        let ec = EcKey::generate(&EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap())
            .unwrap();
        let pkey = PKey::from_ec_key(ec).unwrap();
        let pem = pkey.private_key_to_pem_pkcs8().unwrap();

        let direct = SigningKey::from_pkey(&pkey).unwrap();
        let loaded = SigningKey::from_pem(&pem, None).unwrap();
        assert_eq!(direct.public_key(), loaded.public_key());
    }
}
