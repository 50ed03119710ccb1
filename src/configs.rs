use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;

use crate::crypto::{KeyFamily, KeySpec, RSA_KEY_SIZE_DEFAULT};
use crate::serial::SerialAllocator;
use crate::trust_store::{RootPolicy, TrustOptions};

pub const DEFAULT_CONFIG_PATH: &str = "pki-tree.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PkiConfig {
    #[serde(default)]
    pub issuance: IssuanceDefaults,
    #[serde(default)]
    pub trust: TrustConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IssuanceDefaults {
    #[serde(default = "default_key_family")]
    pub key_family: KeyFamily,
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: u32,
    #[serde(default = "default_serial_base")]
    pub serial_base: u64,
    #[serde(default = "default_root_validity")]
    pub root_validity_days: u32,
    #[serde(default = "default_authority_validity")]
    pub authority_validity_days: u32,
    #[serde(default = "default_leaf_validity")]
    pub leaf_validity_days: u32,
}

impl Default for IssuanceDefaults {
    fn default() -> Self {
        Self {
            key_family: default_key_family(),
            rsa_bits: default_rsa_bits(),
            serial_base: default_serial_base(),
            root_validity_days: default_root_validity(),
            authority_validity_days: default_authority_validity(),
            leaf_validity_days: default_leaf_validity(),
        }
    }
}

fn default_key_family() -> KeyFamily {
    KeyFamily::EcP256
}

fn default_rsa_bits() -> u32 {
    RSA_KEY_SIZE_DEFAULT
}

fn default_serial_base() -> u64 {
    1
}

fn default_root_validity() -> u32 {
    3650 // 10 years
}

fn default_authority_validity() -> u32 {
    1825 // 5 years
}

fn default_leaf_validity() -> u32 {
    365
}

impl IssuanceDefaults {
    pub fn key_spec(&self) -> KeySpec {
        match self.key_family {
            KeyFamily::Rsa => KeySpec::rsa(self.rsa_bits),
            KeyFamily::EcP256 => KeySpec::ec_p256(),
        }
    }

    pub fn serials(&self) -> SerialAllocator {
        SerialAllocator::new(self.serial_base)
    }

    pub fn root_lifetime(&self) -> Duration {
        Duration::days(i64::from(self.root_validity_days))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrustConfig {
    #[serde(default = "default_check_validity")]
    pub check_validity: bool,
    #[serde(default)]
    pub root_policy: RootPolicy,
    #[serde(default)]
    pub max_chain_depth: Option<usize>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            check_validity: default_check_validity(),
            root_policy: RootPolicy::default(),
            max_chain_depth: None,
        }
    }
}

fn default_check_validity() -> bool {
    true
}

impl TrustConfig {
    pub fn options(&self) -> TrustOptions {
        TrustOptions {
            check_validity: self.check_validity,
            root_policy: self.root_policy,
            max_chain_depth: self.max_chain_depth,
        }
    }
}

impl PkiConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PkiConfig =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load `pki-tree.toml` from the working directory, or defaults if absent
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }
}
