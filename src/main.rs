//! PKI Tree sandbox
//!
//! Builds a small authority hierarchy, publishes it in a naming directory and
//! runs the trust-store scenarios against it:
//!
//! 1. `.` self-signs, then issues `com.`, which issues `coco.com.`, which
//!    issues `frank.coco.com.`; each one is published under its name.
//! 2. A rogue authority impersonating `com.` issues `evil.com.`; publishing
//!    it is rejected.
//! 3. A trust store anchored at `.` validates a leaf issued by `com.` and
//!    refuses a leaf issued by the rogue until the rogue is pooled.
//!
//! Usage: `pki-tree [config.toml]` (defaults to `pki-tree.toml` if present).
//! Set `RUST_LOG=debug` to see issuance and chain-building events.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use pki_tree::{
    Authority, Certificate, CertificateAuthority, DottedName, Identity, NamingDirectory,
    PkiConfig, TrustStore, Validity,
};

fn main() -> Result<()> {
    init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => PkiConfig::from_file(&path)?,
        None => PkiConfig::load()?,
    };
    tracing::info!(?config, "configuration loaded");

    println!("=== PKI Tree Sandbox ===\n");
    let directory = NamingDirectory::new();
    build_hierarchy(&directory, &config)?;
    reject_rogue_publish(&directory, &config)?;
    run_trust_scenarios(&directory, &config)?;
    println!("\n✓ Sandbox complete ({} names published)", directory.len());
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_hierarchy(directory: &NamingDirectory, config: &PkiConfig) -> Result<()> {
    let issuance = &config.issuance;
    let root = Authority::root(
        Utc::now(),
        issuance.root_lifetime(),
        issuance.key_spec(),
        issuance.serials(),
    )
    .context("Failed to create root authority")?;
    directory
        .publish(&DottedName::root(), root)
        .context("Failed to publish root authority")?;
    println!("✓ Root authority published at .");

    for path in ["com.", "coco.com.", "frank.coco.com."] {
        let path = DottedName::parse(path)?;
        let parent_path = path
            .parent()
            .ok_or_else(|| anyhow!("{path} has no parent"))?;
        let label = path.leaf().ok_or_else(|| anyhow!("{path} has no label"))?;

        let parent = directory.lookup(&parent_path)?;
        let mut child = Authority::new(label, &parent_path, issuance.key_spec())?;
        let certificate = parent
            .issue_for(
                &mut child,
                Validity::days_from_now(issuance.authority_validity_days),
            )
            .with_context(|| format!("Failed to issue certificate for {path}"))?;
        println!("✓ Issued {certificate}");

        child.promote(certificate, issuance.serials())?;
        directory
            .publish(&path, child)
            .with_context(|| format!("Failed to publish {path}"))?;
        println!("✓ Published {path}");
    }
    Ok(())
}

fn reject_rogue_publish(directory: &NamingDirectory, config: &PkiConfig) -> Result<()> {
    let issuance = &config.issuance;
    let impostor = Authority::self_signed(
        DottedName::parse("com.")?,
        Utc::now(),
        Duration::days(i64::from(issuance.authority_validity_days)),
        issuance.key_spec(),
        issuance.serials(),
    )?;

    let evil_path = DottedName::parse("evil.com.")?;
    let mut evil = Authority::new("evil", impostor.path(), issuance.key_spec())?;
    let certificate = impostor.issue_for(&mut evil, Validity::days_from_now(30))?;
    evil.promote(certificate, issuance.serials())?;

    match directory.publish(&evil_path, evil) {
        Ok(()) => Err(anyhow!("rogue authority was published at {evil_path}")),
        Err(e) => {
            println!("✓ Rogue publish rejected: {e}");
            if directory.lookup(&evil_path).is_ok() {
                return Err(anyhow!("{evil_path} resolves after a rejected publish"));
            }
            Ok(())
        }
    }
}

fn run_trust_scenarios(directory: &NamingDirectory, config: &PkiConfig) -> Result<()> {
    let issuance = &config.issuance;
    let root = directory.lookup(&DottedName::root())?;
    let com = directory.lookup(&DottedName::parse("com.")?)?;
    let root_cert = root
        .certificate()
        .cloned()
        .ok_or_else(|| anyhow!("root authority has no certificate"))?;
    let com_ca = com
        .certificate_authority()
        .ok_or_else(|| anyhow!("com. is not active"))?;

    let store = TrustStore::with_options(config.trust.options());
    store.add_trusted(root_cert.clone());
    store.add_untrusted(root_cert);
    store.add_untrusted(com_ca.certificate().clone());

    let cert1 = issue_leaf(com_ca, "cert1.com.", config)?;
    match store.verify(&cert1) {
        Ok(()) => println!("✓ {} verified", cert1.subject_name()),
        Err(e) => println!("✗ {} failed: {e}", cert1.subject_name()),
    }

    let rogue = CertificateAuthority::generate_self_signed(
        DottedName::parse("rogue.")?,
        Utc::now(),
        issuance.root_lifetime(),
        issuance.key_spec(),
        issuance.serials(),
    )?;
    let cert2 = issue_leaf(&rogue, "cert2.rogue.", config)?;

    let before = store.verify(&cert2);
    store.add_untrusted(rogue.certificate().clone());
    let after = store.verify(&cert2);
    for (stage, outcome) in [("before pooling rogue", &before), ("after pooling rogue", &after)] {
        match outcome {
            Ok(()) => println!("  {} {stage}: verified", cert2.subject_name()),
            Err(e) => println!("  {} {stage}: {e}", cert2.subject_name()),
        }
    }
    if before == after {
        return Err(anyhow!("pooling the rogue authority changed nothing"));
    }
    Ok(())
}

fn issue_leaf(ca: &CertificateAuthority, subject: &str, config: &PkiConfig) -> Result<Certificate> {
    let identity = Identity::generate(DottedName::parse(subject)?, config.issuance.key_spec())?;
    let not_before = Utc::now();
    let not_after = not_before + Duration::days(i64::from(config.issuance.leaf_validity_days));
    let certificate = ca
        .process_request(identity.request()?, not_before, not_after)
        .with_context(|| format!("Failed to issue {subject}"))?;
    Ok(certificate)
}
