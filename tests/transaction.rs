// tests/transaction.rs

//! Install transactions end to end: commit, rollback scopes, cancellation,
//! progress reporting and repository downloads.

mod common;

use common::{FileEngine, director, feature, names, write_feature};
use esa_install::acquire::{KeySpec, LockProbe, file_url};
use esa_install::checksums::{self, ChecksumManifest};
use esa_install::hash;
use esa_install::progress::RecordingListener;
use esa_install::resolver::network::ResourceType;
use esa_install::{
    CallbackListener, CapabilityClause, Descriptor, Director, Error, GroupState, InstallPolicy,
    ListenerAction, ProgressEvent, ProgressState, RepositoryResolver, ResolutionPolicy,
    ResourceHandle, Result, TomlManifestReader, Visibility,
};
use sequoia_openpgp::Cert;
use sequoia_openpgp::cert::CertBuilder;
use sequoia_openpgp::policy::StandardPolicy;
use sequoia_openpgp::serialize::Serialize;
use sequoia_openpgp::serialize::stream::{Message, Signer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn temp_entries(root: &Path) -> usize {
    match std::fs::read_dir(root.join("tmp/esa-install")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// =============================================================================
// COMMIT
// =============================================================================

#[test]
fn test_commit_records_registry_checksums_and_fingerprint() {
    let root = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_feature(repo.path(), &feature("web").requires("core"), &[("lib/web.jar", "web")]);
    write_feature(repo.path(), &feature("core"), &[("lib/core.jar", "core")]);

    let (engine, log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    let report = director
        .install_features(&names(&["web"]), Some(repo.path()), None)
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.installed_assets(), vec!["core", "web"]);
    assert_eq!(*log.lock().unwrap(), vec!["install:core", "install:web"]);
    assert_eq!(director.installed_features().unwrap().len(), 2);

    let manifest = ChecksumManifest::load(&director.config().checksum_manifest()).unwrap();
    assert_eq!(manifest.get("lib/web.jar"), Some(hash::sha256(b"web").as_str()));
    assert_eq!(manifest.get("lib/core.jar"), Some(hash::sha256(b"core").as_str()));

    let stored = checksums::read_fingerprint(&director.config().fingerprint_path()).unwrap();
    assert_eq!(stored, report.fingerprint);
    assert_eq!(temp_entries(root.path()), 0);
    assert!(director.last_install().is_some_and(|r| r.is_complete()));

    let err = director
        .install_features(&names(&["web"]), Some(repo.path()), None)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
}

#[cfg(unix)]
#[test]
fn test_scripts_are_made_executable() {
    use std::os::unix::fs::PermissionsExt;

    let root = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_feature(
        repo.path(),
        &feature("launcher"),
        &[("bin/start.sh", "#!/bin/sh\n"), ("lib/launcher.jar", "jar")],
    );

    let (engine, _log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    let report = director
        .install_features(&names(&["launcher"]), Some(repo.path()), None)
        .unwrap();

    assert!(report.permission_failures.is_empty());
    let script = std::fs::metadata(root.path().join("bin/start.sh")).unwrap();
    assert_ne!(script.permissions().mode() & 0o111, 0);
    let jar = std::fs::metadata(root.path().join("lib/launcher.jar")).unwrap();
    assert_eq!(jar.permissions().mode() & 0o111, 0);
}

// =============================================================================
// ROLLBACK
// =============================================================================

fn two_groups(repo: &Path) {
    write_feature(repo, &feature("good"), &[("lib/good.jar", "good")]);
    write_feature(
        repo,
        &feature("bad"),
        &[("lib/bad-1.jar", "one"), ("lib/bad-2.jar", "two")],
    );
}

#[test]
fn test_failed_group_rolls_back_alone() {
    let root = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    two_groups(repo.path());

    let (engine, _log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine.failing_on("bad"));
    let err = director
        .install_features(&names(&["good", "bad"]), Some(repo.path()), None)
        .unwrap_err();

    match &err {
        Error::IoError(message) => assert!(message.contains("injected failure"), "{message}"),
        other => panic!("expected IoError, got {other:?}"),
    }

    let report = director.last_install().unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.groups[0].state, GroupState::Installed);
    assert_eq!(report.groups[1].state, GroupState::RolledBack);

    assert!(root.path().join("lib/good.jar").exists());
    assert!(!root.path().join("lib/bad-1.jar").exists());
    let installed: Vec<String> = director
        .installed_features()
        .unwrap()
        .iter()
        .map(|f| f.symbolic_name().to_string())
        .collect();
    assert_eq!(installed, vec!["good"]);
}

#[test]
fn test_rollback_all_undoes_earlier_groups() {
    let root = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    two_groups(repo.path());

    let (engine, _log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine.failing_on("bad"));
    let resolved = director
        .resolve(&names(&["good", "bad"]), repo.path(), false)
        .unwrap();
    assert!(director.install_with(resolved.plan, true).is_err());

    let report = director.last_install().unwrap();
    assert!(report.groups.iter().all(|g| g.state == GroupState::RolledBack));
    assert!(!root.path().join("lib/good.jar").exists());
    assert!(director.installed_features().unwrap().is_empty());
    assert_eq!(temp_entries(root.path()), 0);
}

// =============================================================================
// CANCELLATION AND PROGRESS
// =============================================================================

#[test]
fn test_listener_cancels_before_second_asset() {
    let root = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_feature(repo.path(), &feature("first"), &[("lib/first.jar", "1")]);
    write_feature(repo.path(), &feature("second"), &[("lib/second.jar", "2")]);

    let (engine, log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    director.add_listener(Arc::new(CallbackListener::new(|event: &ProgressEvent| {
        if event.state == ProgressState::Installing && event.asset.as_deref() == Some("second") {
            ListenerAction::Cancel
        } else {
            ListenerAction::Continue
        }
    })));

    let err = director
        .install_features(&names(&["first", "second"]), Some(repo.path()), None)
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)));
    assert_eq!(*log.lock().unwrap(), vec!["install:first"]);
    assert!(!root.path().join("lib/second.jar").exists());

    let report = director.last_install().unwrap();
    assert_eq!(report.groups[1].state, GroupState::RolledBack);

    // The token is reset for the next operation
    let retry = director
        .install_features(&names(&["first"]), Some(repo.path()), None)
        .unwrap_err();
    assert!(matches!(retry, Error::AlreadyExists(_)));
}

#[test]
fn test_progress_ends_complete_at_hundred() {
    let root = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_feature(repo.path(), &feature("web"), &[("lib/web.jar", "web")]);

    let (engine, _log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    let recorder = Arc::new(RecordingListener::new());
    director.add_listener(recorder.clone());
    director
        .install_features(&names(&["web"]), Some(repo.path()), None)
        .unwrap();

    let events = recorder.events();
    assert_eq!(events.first().map(|e| e.state), Some(ProgressState::Resolving));
    assert!(events.iter().any(|e| e.state == ProgressState::Installing));
    let last = events.last().unwrap();
    assert_eq!(last.state, ProgressState::Complete);
    assert_eq!(last.percent, 100);
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
}

#[test]
fn test_auto_feature_joins_as_own_group() {
    let root = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_feature(repo.path(), &feature("web"), &[("lib/web.jar", "web")]);
    write_feature(
        repo.path(),
        &feature("web-security")
            .with_visibility(Visibility::Private)
            .with_auto(InstallPolicy::WhenSatisfied, vec![CapabilityClause::require("web")]),
        &[("lib/web-security.jar", "sec")],
    );

    let (engine, _log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    let report = director
        .install_features(&names(&["web"]), Some(repo.path()), None)
        .unwrap();

    let groups: Vec<&str> = report.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(groups, vec!["web", "web-security"]);
    assert!(root.path().join("lib/web-security.jar").exists());
}

// =============================================================================
// REPOSITORY
// =============================================================================

/// Serves archives from a directory over file:// URLs
struct DirectoryRepository {
    dir: PathBuf,
    digest_override: Option<String>,
    size_override: Option<u64>,
}

impl DirectoryRepository {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            digest_override: None,
            size_override: None,
        }
    }
}

impl RepositoryResolver for DirectoryRepository {
    fn resolve(&self, names: &[String], _policy: &ResolutionPolicy) -> Result<Vec<Vec<ResourceHandle>>> {
        names
            .iter()
            .map(|name| {
                let path = self.dir.join(format!("{name}.esa"));
                let data = std::fs::read(&path)?;
                let digest = self
                    .digest_override
                    .clone()
                    .unwrap_or_else(|| hash::sha256(&data));
                let handle = ResourceHandle::new(ResourceType::Feature, name, file_url(&path)?)
                    .with_digest(digest)
                    .with_size(self.size_override.unwrap_or(data.len() as u64))
                    .with_descriptor(Descriptor::Feature(feature(name)));
                Ok(vec![handle])
            })
            .collect()
    }
}

#[test]
fn test_repository_asset_is_downloaded_and_installed() {
    let root = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    write_feature(remote.path(), &feature("remote"), &[("lib/remote.jar", "r")]);

    let (engine, _log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    let repository = DirectoryRepository::new(remote.path());
    let report = director
        .install_features(&names(&["remote"]), None, Some(&repository))
        .unwrap();

    assert_eq!(report.installed_assets(), vec!["remote"]);
    assert!(root.path().join("lib/remote.jar").exists());
    assert_eq!(temp_entries(root.path()), 0);
}

#[test]
fn test_repository_digest_mismatch_writes_nothing() {
    let root = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    write_feature(remote.path(), &feature("remote"), &[("lib/remote.jar", "r")]);

    let (engine, log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    let repository = DirectoryRepository {
        digest_override: Some("00".repeat(32)),
        ..DirectoryRepository::new(remote.path())
    };
    let err = director
        .install_features(&names(&["remote"]), None, Some(&repository))
        .unwrap_err();

    assert!(matches!(err, Error::ChecksumMismatch { ref algorithm, .. } if algorithm == "sha256"));
    assert!(log.lock().unwrap().is_empty());
    assert!(!root.path().join("lib/remote.jar").exists());
    assert!(director.installed_features().unwrap().is_empty());
    assert_eq!(temp_entries(root.path()), 0);
}

#[test]
fn test_space_preflight_runs_before_any_download() {
    let root = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    write_feature(remote.path(), &feature("huge"), &[("lib/huge.jar", "h")]);

    let (engine, log) = FileEngine::new();
    let mut director = director(root.path(), TomlManifestReader::new(), engine);
    let repository = DirectoryRepository {
        size_override: Some(u64::MAX / 2),
        ..DirectoryRepository::new(remote.path())
    };
    let err = director
        .install_features(&names(&["huge"]), None, Some(&repository))
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientSpace { .. }));
    assert!(log.lock().unwrap().is_empty());
    assert!(!root.path().join("tmp/esa-install").exists());
}

// =============================================================================
// SIGNATURES
// =============================================================================

fn signing_cert() -> Cert {
    let (cert, _) = CertBuilder::general_purpose(None, Some("release@example.org"))
        .generate()
        .unwrap();
    cert
}

fn detached_signature(cert: &Cert, data: &[u8]) -> Vec<u8> {
    let policy = StandardPolicy::new();
    let keypair = cert
        .keys()
        .unencrypted_secret()
        .with_policy(&policy, None)
        .for_signing()
        .next()
        .unwrap()
        .key()
        .clone()
        .into_keypair()
        .unwrap();

    let mut sink = Vec::new();
    let mut signer = Signer::new(Message::new(&mut sink), keypair)
        .detached()
        .build()
        .unwrap();
    signer.write_all(data).unwrap();
    signer.finalize().unwrap();
    sink
}

/// Director that verifies downloads against `cert`, its public key stored in `keys`
fn verifying_director(
    root: &Path,
    keys: &Path,
    cert: &Cert,
    abort_on_failure: bool,
) -> Director<TomlManifestReader> {
    let key_file = keys.join("release.asc");
    let mut armored = Vec::new();
    cert.armored().serialize(&mut armored).unwrap();
    std::fs::write(&key_file, armored).unwrap();

    let mut config = common::test_config(root);
    config.signatures.verify = true;
    config.signatures.abort_on_failure = abort_on_failure;
    config.signatures.keys = vec![KeySpec {
        id: cert.keyid().to_hex(),
        location: key_file.display().to_string(),
        default: true,
    }];

    let (engine, _log) = FileEngine::new();
    Director::new(config, TomlManifestReader::new(), Box::new(engine))
        .unwrap()
        .with_lock_probe(LockProbe::new(1, Duration::from_millis(1)))
}

/// Publish `remote.esa` with a signature over other bytes
fn remote_with_bad_signature(remote: &Path, cert: &Cert) {
    write_feature(remote, &feature("remote"), &[("lib/remote.jar", "r")]);
    std::fs::write(remote.join("remote.esa.asc"), detached_signature(cert, b"something else")).unwrap();
}

#[test]
fn test_bad_signature_aborts_group() {
    let root = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let keys = TempDir::new().unwrap();
    let cert = signing_cert();
    remote_with_bad_signature(remote.path(), &cert);

    let mut director = verifying_director(root.path(), keys.path(), &cert, true);
    let repository = DirectoryRepository::new(remote.path());
    let err = director
        .install_features(&names(&["remote"]), None, Some(&repository))
        .unwrap_err();

    assert!(matches!(err, Error::SignatureUnverified(_)), "{err:?}");
    let report = director.last_install().unwrap();
    assert_eq!(report.failed_signatures, vec!["remote"]);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].state, GroupState::RolledBack);
    assert!(!root.path().join("lib/remote.jar").exists());
    assert!(director.installed_features().unwrap().is_empty());
    assert_eq!(temp_entries(root.path()), 0);
}

#[test]
fn test_bad_signature_reported_when_not_aborting() {
    let root = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let keys = TempDir::new().unwrap();
    let cert = signing_cert();
    remote_with_bad_signature(remote.path(), &cert);

    let mut director = verifying_director(root.path(), keys.path(), &cert, false);
    let repository = DirectoryRepository::new(remote.path());
    let report = director
        .install_features(&names(&["remote"]), None, Some(&repository))
        .unwrap();

    assert_eq!(report.installed_assets(), vec!["remote"]);
    assert_eq!(report.failed_signatures, vec!["remote"]);
    assert!(root.path().join("lib/remote.jar").exists());
    assert_eq!(director.installed_features().unwrap().len(), 1);
}

#[test]
fn test_good_signature_and_missing_signature() {
    let root = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let keys = TempDir::new().unwrap();
    let cert = signing_cert();
    let archive = write_feature(remote.path(), &feature("signed"), &[("lib/signed.jar", "s")]);
    let data = std::fs::read(&archive).unwrap();
    std::fs::write(remote.path().join("signed.esa.asc"), detached_signature(&cert, &data)).unwrap();
    write_feature(remote.path(), &feature("unsigned"), &[("lib/unsigned.jar", "u")]);

    let mut director = verifying_director(root.path(), keys.path(), &cert, false);
    let repository = DirectoryRepository::new(remote.path());
    let report = director
        .install_features(&names(&["signed", "unsigned"]), None, Some(&repository))
        .unwrap();

    assert_eq!(report.failed_signatures, vec!["unsigned"]);
    assert!(root.path().join("lib/signed.jar").exists());
    assert!(root.path().join("lib/unsigned.jar").exists());
}
