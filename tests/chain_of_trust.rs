//! Integration tests for issuance, naming and trust-store validation.
//!
//! These tests drive the public API end to end: authorities are created and
//! published through a directory, and certificates are validated by a trust
//! store that never sees that directory.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use pki_tree::{
    Authority, Certificate, CertificateAuthority, CertificateRequest, DottedName, Identity,
    KeySpec, NamingDirectory, NamingError, OpensslVerifier, RootPolicy, SerialAllocator,
    SigningKey, TrustOptions, TrustStore, Validity, VerificationError,
};

fn name(s: &str) -> DottedName {
    DottedName::parse(s).expect("valid name")
}

fn root_ca() -> CertificateAuthority {
    CertificateAuthority::generate_self_signed(
        DottedName::root(),
        Utc::now() - Duration::minutes(5),
        Duration::days(3650),
        KeySpec::ec_p256(),
        SerialAllocator::default(),
    )
    .expect("root self-signs")
}

fn issue(ca: &CertificateAuthority, subject: &str) -> (Identity, Certificate) {
    let identity = Identity::generate(name(subject), KeySpec::ec_p256()).expect("keygen");
    let now = Utc::now() - Duration::minutes(1);
    let cert = ca
        .process_request(
            identity.request().expect("request"),
            now,
            now + Duration::days(90),
        )
        .expect("issued");
    (identity, cert)
}

fn promote(ca: &CertificateAuthority, subject: &str) -> CertificateAuthority {
    let (identity, cert) = issue(ca, subject);
    CertificateAuthority::from_existing(
        cert,
        Box::new(identity.into_signer()),
        SerialAllocator::default(),
    )
    .expect("key matches certificate")
}

fn published_child(directory: &NamingDirectory, path: &str) -> Result<(), NamingError> {
    let path = name(path);
    let parent_path = path.parent().expect("not root");
    let parent = directory.lookup(&parent_path)?;
    let mut child = Authority::new(path.leaf().expect("label"), &parent_path, KeySpec::ec_p256())?;
    let cert = parent.issue_for(&mut child, Validity::days_from_now(365))?;
    child.promote(cert, SerialAllocator::default())?;
    directory.publish(&path, child)
}

#[test]
fn issued_certificates_verify_under_issuer_key() {
    let root = root_ca();
    let com = promote(&root, "com.");
    for subject in ["a.com.", "b.com.", "c.com."] {
        let (_identity, cert) = issue(&com, subject);
        assert!(cert.verify_signature(com.public_key(), &OpensslVerifier));
        assert!(!cert.verify_signature(root.public_key(), &OpensslVerifier));
    }
}

#[test]
fn serials_from_one_authority_are_distinct_and_increasing() {
    let root = root_ca();
    let serials: Vec<u64> = (0..8)
        .map(|i| issue(&root, &format!("host{i}.")).1.serial_number())
        .collect();
    assert!(serials.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(serials.iter().collect::<HashSet<_>>().len(), serials.len());
}

#[test]
fn concurrent_issuance_never_reuses_serials() {
    let root = Arc::new(root_ca());
    let serials: Vec<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let root = Arc::clone(&root);
                scope.spawn(move || {
                    (0..5)
                        .map(|i| issue(&root, &format!("t{t}-{i}.")).1.serial_number())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("issuer thread"))
            .collect()
    });
    assert_eq!(serials.len(), 20);
    assert_eq!(serials.iter().collect::<HashSet<_>>().len(), 20);
}

#[test]
fn hierarchy_publishes_and_resolves() {
    let directory = NamingDirectory::new();
    let root = Authority::root(
        Utc::now(),
        Duration::days(3650),
        KeySpec::ec_p256(),
        SerialAllocator::default(),
    )
    .unwrap();
    directory.publish(&DottedName::root(), root).unwrap();

    published_child(&directory, "com.").unwrap();
    published_child(&directory, "coco.com.").unwrap();
    published_child(&directory, "frank.coco.com.").unwrap();

    let frank = directory.lookup(&name("frank.coco.com.")).unwrap();
    assert_eq!(frank.path(), &name("frank.coco.com."));
    let id = directory.resolve(&name("frank.coco.com.")).unwrap();
    assert_eq!(directory.full_name(id).unwrap(), name("frank.coco.com."));
}

#[test]
fn publish_signed_by_unrelated_authority_leaves_no_trace() {
    let directory = NamingDirectory::new();
    let root = Authority::root(
        Utc::now(),
        Duration::days(3650),
        KeySpec::ec_p256(),
        SerialAllocator::default(),
    )
    .unwrap();
    directory.publish(&DottedName::root(), root).unwrap();
    published_child(&directory, "com.").unwrap();

    let unrelated = Authority::self_signed(
        name("com."),
        Utc::now(),
        Duration::days(365),
        KeySpec::ec_p256(),
        SerialAllocator::default(),
    )
    .unwrap();
    let mut coco = Authority::new("coco", &name("com."), KeySpec::ec_p256()).unwrap();
    let cert = unrelated
        .issue_for(&mut coco, Validity::days_from_now(30))
        .unwrap();
    coco.promote(cert, SerialAllocator::default()).unwrap();

    let err = directory.publish(&name("coco.com."), coco).unwrap_err();
    assert!(matches!(err, NamingError::UnauthorizedPublish { .. }));
    assert!(matches!(
        directory.lookup(&name("coco.com.")),
        Err(NamingError::NotFound(_))
    ));
    assert!(directory.children(&name("com.")).unwrap().is_empty());
}

#[test]
fn chain_of_trust_through_intermediate() {
    let root = root_ca();
    let com = promote(&root, "com.");
    let (_identity, cert1) = issue(&com, "cert1.com.");

    let store = TrustStore::new();
    store.add_trusted(root.certificate().clone());
    store.add_untrusted(root.certificate().clone());
    store.add_untrusted(com.certificate().clone());

    assert_eq!(store.verify(&cert1), Ok(()));
}

#[test]
fn rogue_issuer_outcome_depends_on_pool_membership() {
    let root = root_ca();
    let com = promote(&root, "com.");
    let rogue = CertificateAuthority::generate_self_signed(
        name("rogue."),
        Utc::now() - Duration::minutes(5),
        Duration::days(365),
        KeySpec::ec_p256(),
        SerialAllocator::default(),
    )
    .unwrap();
    let (_identity, cert2) = issue(&rogue, "cert2.rogue.");

    let store = TrustStore::new();
    store.add_trusted(root.certificate().clone());
    store.add_untrusted(root.certificate().clone());
    store.add_untrusted(com.certificate().clone());

    let before = store.verify(&cert2);
    assert!(matches!(
        before,
        Err(VerificationError::IssuerNotFound { .. })
    ));

    store.add_untrusted(rogue.certificate().clone());
    let after = store.verify(&cert2);
    assert_eq!(after, Ok(()));
    assert_ne!(before, after);
}

#[test]
fn rogue_issuer_stays_untrusted_when_only_anchors_are_roots() {
    let root = root_ca();
    let rogue = CertificateAuthority::generate_self_signed(
        name("rogue."),
        Utc::now() - Duration::minutes(5),
        Duration::days(365),
        KeySpec::ec_p256(),
        SerialAllocator::default(),
    )
    .unwrap();
    let (_identity, cert2) = issue(&rogue, "cert2.rogue.");

    let store = TrustStore::with_options(TrustOptions {
        root_policy: RootPolicy::AnchorsOnly,
        ..TrustOptions::default()
    });
    store.add_trusted(root.certificate().clone());
    let before = store.verify(&cert2);
    store.add_untrusted(rogue.certificate().clone());
    let after = store.verify(&cert2);

    assert!(matches!(after, Err(VerificationError::UntrustedRoot { .. })));
    assert_ne!(before, after);

    store.add_trusted(rogue.certificate().clone());
    assert_eq!(store.verify(&cert2), Ok(()));
}

#[test]
fn self_signed_anchor_needs_no_hops() {
    let root = root_ca();
    let store = TrustStore::new();
    store.add_trusted(root.certificate().clone());

    let chain = store.verify_chain(root.certificate()).unwrap();
    assert_eq!(chain, vec![root.certificate().clone()]);
}

#[test]
fn mutually_issued_certificates_terminate() {
    let key_a = SigningKey::generate(KeySpec::ec_p256()).unwrap();
    let key_b = SigningKey::generate(KeySpec::ec_p256()).unwrap();
    let request_a = CertificateRequest::new(name("a."), &key_a).unwrap();
    let request_b = CertificateRequest::new(name("b."), &key_b).unwrap();

    let not_before = Utc::now() - Duration::minutes(5);
    let ca_a = CertificateAuthority::self_signed(
        name("a."),
        not_before,
        Duration::days(30),
        Box::new(key_a),
        SerialAllocator::default(),
    )
    .unwrap();
    let ca_b = CertificateAuthority::self_signed(
        name("b."),
        not_before,
        Duration::days(30),
        Box::new(key_b),
        SerialAllocator::default(),
    )
    .unwrap();

    // a. is certified by b. and b. by a.: each names the other as issuer.
    let now = Utc::now() - Duration::minutes(1);
    let a_by_b = ca_b
        .process_request(request_a, now, now + Duration::days(1))
        .unwrap();
    let b_by_a = ca_a
        .process_request(request_b, now, now + Duration::days(1))
        .unwrap();
    let (_identity, leaf) = issue(&ca_a, "leaf.a.");

    let store = TrustStore::new();
    store.add_untrusted(a_by_b.clone());
    store.add_untrusted(b_by_a.clone());

    for cert in [&a_by_b, &b_by_a, &leaf] {
        assert!(matches!(
            store.verify(cert),
            Err(VerificationError::ChainTooLong { .. })
        ));
    }
}

#[test]
fn cycle_of_look_alike_issuers_terminates_quickly() {
    let key_a = SigningKey::generate(KeySpec::ec_p256()).unwrap();
    let key_b = SigningKey::generate(KeySpec::ec_p256()).unwrap();
    let request_a = CertificateRequest::new(name("a."), &key_a).unwrap();
    let request_b = CertificateRequest::new(name("b."), &key_b).unwrap();

    let not_before = Utc::now() - Duration::minutes(5);
    let ca_a = CertificateAuthority::self_signed(
        name("a."),
        not_before,
        Duration::days(30),
        Box::new(key_a),
        SerialAllocator::default(),
    )
    .unwrap();
    let ca_b = CertificateAuthority::self_signed(
        name("b."),
        not_before,
        Duration::days(30),
        Box::new(key_b),
        SerialAllocator::default(),
    )
    .unwrap();

    // Four distinct certificates per name, every one signed by the other
    // name's key, so each link has four valid candidate issuers.
    let now = Utc::now() - Duration::minutes(1);
    let store = TrustStore::new();
    let mut a_certs = Vec::new();
    for _ in 0..4 {
        let a = ca_b
            .process_request(request_a.clone(), now, now + Duration::days(1))
            .unwrap();
        let b = ca_a
            .process_request(request_b.clone(), now, now + Duration::days(1))
            .unwrap();
        store.add_untrusted(a.clone());
        store.add_untrusted(b);
        a_certs.push(a);
    }
    assert_eq!(store.untrusted_count(), 8);

    let started = Instant::now();
    for cert in &a_certs {
        assert!(matches!(
            store.verify(cert),
            Err(VerificationError::ChainTooLong { .. })
        ));
    }
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
