// src/acquire/mod.rs

//! Artifact acquisition: download, checksum, signature
//!
//! [`Acquirer::acquire`] downloads one artifact, works out which digests it
//! must match (from the resolver's metadata or from `.sha256`/`.sha1`/`.md5`
//! sidecar files fetched next to it), and compares them against locally
//! recomputed values. On any mismatch every file fetched for that artifact is
//! deleted before the error is returned.

pub mod client;
pub mod gpg;
pub mod lock;

pub use client::{Credentials, ProxySettings, Transport, TransportConfig, file_url};
pub use gpg::{KeyRing, KeySpec, SignedArtifact, validate_key};
pub use lock::LockProbe;

use crate::error::{Error, Result};
use crate::hash::{self, HashAlgorithm};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of detached signature files
pub const SIGNATURE_EXTENSION: &str = "asc";

/// Expected digests and optional signature for one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityRecord {
    digests: BTreeMap<HashAlgorithm, String>,
    signature_url: Option<String>,
    require_digest: bool,
}

impl IntegrityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_digest(mut self, algorithm: HashAlgorithm, value: impl Into<String>) -> Self {
        self.digests.insert(algorithm, value.into());
        self
    }

    pub fn with_signature(mut self, url: impl Into<String>) -> Self {
        self.signature_url = Some(url.into());
        self
    }

    /// Fail instead of warning when no digest can be found
    pub fn require_digest(mut self) -> Self {
        self.require_digest = true;
        self
    }

    pub fn digest(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.digests.get(&algorithm).map(String::as_str)
    }

    pub fn digests(&self) -> &BTreeMap<HashAlgorithm, String> {
        &self.digests
    }

    pub fn signature_url(&self) -> Option<&str> {
        self.signature_url.as_deref()
    }

    pub fn is_digest_required(&self) -> bool {
        self.require_digest
    }
}

/// One download request
#[derive(Debug, Clone, Copy)]
pub struct AcquireRequest<'a> {
    /// Asset id used in error messages
    pub asset: &'a str,
    pub url: &'a str,
    pub target: &'a Path,
    pub integrity: &'a IntegrityRecord,
    pub credentials: Option<&'a Credentials>,
}

/// A downloaded and checksum-verified artifact
#[derive(Debug, Clone)]
pub struct AcquiredArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    /// Algorithms the artifact was checked with
    pub verified_with: Vec<HashAlgorithm>,
    /// Detached signature, when one was published
    pub signature: Option<PathBuf>,
}

/// Download + verify pipeline
pub struct Acquirer {
    transport: Transport,
    sidecars: Vec<HashAlgorithm>,
}

impl Acquirer {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            sidecars: HashAlgorithm::ALL.to_vec(),
        }
    }

    /// Limit which sidecar digests are looked for
    pub fn with_sidecars(mut self, algorithms: Vec<HashAlgorithm>) -> Self {
        self.sidecars = algorithms;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn acquire(
        &self,
        request: &AcquireRequest<'_>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<AcquiredArtifact> {
        let mut fetched: Vec<PathBuf> = Vec::new();
        match self.acquire_inner(request, progress, &mut fetched) {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                remove_all(&fetched);
                Err(e)
            }
        }
    }

    fn acquire_inner(
        &self,
        request: &AcquireRequest<'_>,
        progress: &mut dyn FnMut(u64, Option<u64>),
        fetched: &mut Vec<PathBuf>,
    ) -> Result<AcquiredArtifact> {
        debug!("Acquiring {} from {}", request.asset, request.url);

        // Claimed before downloading so a partial file is cleaned up too
        claim(fetched, request.target);
        let bytes = self
            .transport
            .download(request.url, request.target, request.credentials, progress)?;

        let mut expected = request.integrity.digests().clone();
        let mut sidecar_files = Vec::new();
        if expected.is_empty() {
            for algorithm in &self.sidecars {
                let url = format!("{}.{}", request.url, algorithm.sidecar_extension());
                let path = hash::sidecar_path(request.target, *algorithm);
                let claimed = claim(fetched, &path);
                if self
                    .transport
                    .download_optional(&url, &path, request.credentials, &mut |_, _| {})?
                    .is_none()
                {
                    if claimed {
                        fetched.pop();
                    }
                    continue;
                }
                if claimed {
                    sidecar_files.push(path.clone());
                }
                let content = std::fs::read_to_string(&path)?;
                match hash::parse_sidecar(&content) {
                    Some(digest) => {
                        expected.insert(*algorithm, digest.to_string());
                    }
                    None => warn!("Empty {} sidecar for {}", algorithm, request.asset),
                }
            }
        }

        if expected.is_empty() {
            if request.integrity.is_digest_required() {
                return Err(Error::DownloadError(format!(
                    "no checksum published for {}",
                    request.asset
                )));
            }
            warn!("No checksum available for {}, skipping verification", request.asset);
        }

        let mut verified_with = Vec::new();
        for (algorithm, digest) in &expected {
            let actual = hash::hash_file(*algorithm, request.target)?;
            if !hash::digests_equal(digest, &actual) {
                warn!(
                    "Checksum mismatch for {}: {} expected {}, got {}",
                    request.asset, algorithm, digest, actual
                );
                return Err(Error::ChecksumMismatch {
                    asset: request.asset.to_string(),
                    algorithm: algorithm.to_string(),
                    expected: digest.clone(),
                    actual,
                });
            }
            verified_with.push(*algorithm);
        }

        let signature = match request.integrity.signature_url() {
            Some(url) => {
                let mut path = request.target.as_os_str().to_os_string();
                path.push(".");
                path.push(SIGNATURE_EXTENSION);
                let path = PathBuf::from(path);
                claim(fetched, &path);
                self.transport
                    .download_optional(url, &path, request.credentials, &mut |_, _| {})?
                    .map(|_| path)
            }
            None => None,
        };

        remove_all(&sidecar_files);
        info!(
            "Verified {} ({} bytes) with {}",
            request.asset,
            bytes,
            if verified_with.is_empty() {
                "no checksum".to_string()
            } else {
                verified_with
                    .iter()
                    .map(HashAlgorithm::name)
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        );

        Ok(AcquiredArtifact {
            path: request.target.to_path_buf(),
            bytes,
            verified_with,
            signature,
        })
    }
}

/// Record `path` for cleanup unless it existed before this acquisition
fn claim(fetched: &mut Vec<PathBuf>, path: &Path) -> bool {
    let created = !path.exists();
    if created {
        fetched.push(path.to_path_buf());
    }
    created
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn acquirer() -> Acquirer {
        Acquirer::new(Transport::new(TransportConfig::default()).unwrap())
    }

    fn request<'a>(url: &'a str, target: &'a Path, integrity: &'a IntegrityRecord) -> AcquireRequest<'a> {
        AcquireRequest {
            asset: "com.example.a",
            url,
            target,
            integrity,
            credentials: None,
        }
    }

    #[test]
    fn test_inline_digest_match() {
        let repo = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let src = repo.path().join("a.esa");
        std::fs::write(&src, b"payload").unwrap();

        let integrity = IntegrityRecord::new()
            .with_digest(HashAlgorithm::Sha256, hash::sha256(b"payload").to_uppercase());
        let url = file_url(&src).unwrap();
        let target = staging.path().join("a.esa");
        let got = acquirer()
            .acquire(&request(&url, &target, &integrity), &mut |_, _| {})
            .unwrap();
        assert_eq!(got.verified_with, vec![HashAlgorithm::Sha256]);
        assert!(target.exists());
    }

    #[test]
    fn test_sidecar_mismatch_removes_everything() {
        let repo = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let src = repo.path().join("a.esa");
        std::fs::write(&src, b"payload").unwrap();
        std::fs::write(repo.path().join("a.esa.sha1"), "0000000000000000000000000000000000000000  a.esa\n").unwrap();

        let integrity = IntegrityRecord::new();
        let url = file_url(&src).unwrap();
        let target = staging.path().join("a.esa");
        let err = acquirer()
            .acquire(&request(&url, &target, &integrity), &mut |_, _| {})
            .unwrap_err();

        assert!(matches!(err, Error::ChecksumMismatch { ref algorithm, .. } if algorithm == "sha1"));
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failure_keeps_files_that_were_already_there() {
        let repo = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let target = staging.path().join("a.esa");
        std::fs::write(&target, b"keep").unwrap();

        let integrity = IntegrityRecord::new();
        let missing = file_url(&repo.path().join("missing.esa")).unwrap();
        let err = acquirer()
            .acquire(&request(&missing, &target, &integrity), &mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::DownloadError(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"keep");

        let src = repo.path().join("a.esa");
        std::fs::write(&src, b"payload").unwrap();
        let sidecar = hash::sidecar_path(&target, HashAlgorithm::Sha1);
        std::fs::write(&sidecar, b"notes").unwrap();
        let integrity = IntegrityRecord::new().with_digest(HashAlgorithm::Sha256, "00".repeat(32));
        let url = file_url(&src).unwrap();
        let err = acquirer()
            .acquire(&request(&url, &target, &integrity), &mut |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(target.exists());
        assert_eq!(std::fs::read(&sidecar).unwrap(), b"notes");
    }

    #[test]
    fn test_sidecars_removed_on_success() {
        let repo = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let src = repo.path().join("a.esa");
        std::fs::write(&src, b"payload").unwrap();
        std::fs::write(
            repo.path().join("a.esa.md5"),
            hash::hash_bytes(HashAlgorithm::Md5, b"payload"),
        )
        .unwrap();

        let integrity = IntegrityRecord::new();
        let url = file_url(&src).unwrap();
        let target = staging.path().join("a.esa");
        let got = acquirer()
            .acquire(&request(&url, &target, &integrity), &mut |_, _| {})
            .unwrap();
        assert_eq!(got.verified_with, vec![HashAlgorithm::Md5]);
        let names: Vec<_> = std::fs::read_dir(staging.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.esa")]);
    }

    #[test]
    fn test_missing_digest_required() {
        let repo = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let src = repo.path().join("a.esa");
        std::fs::write(&src, b"payload").unwrap();

        let url = file_url(&src).unwrap();
        let target = staging.path().join("a.esa");

        let lenient = IntegrityRecord::new();
        assert!(acquirer().acquire(&request(&url, &target, &lenient), &mut |_, _| {}).is_ok());

        let strict = IntegrityRecord::new().require_digest();
        assert!(acquirer().acquire(&request(&url, &target, &strict), &mut |_, _| {}).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn test_signature_fetched_alongside() {
        let repo = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let src = repo.path().join("a.esa");
        std::fs::write(&src, b"payload").unwrap();
        std::fs::write(repo.path().join("a.esa.asc"), b"sig").unwrap();

        let url = file_url(&src).unwrap();
        let sig_url = file_url(&repo.path().join("a.esa.asc")).unwrap();
        let integrity = IntegrityRecord::new()
            .with_digest(HashAlgorithm::Sha256, hash::sha256(b"payload"))
            .with_signature(sig_url);
        let target = staging.path().join("a.esa");
        let got = acquirer()
            .acquire(&request(&url, &target, &integrity), &mut |_, _| {})
            .unwrap();
        assert_eq!(got.signature, Some(staging.path().join("a.esa.asc")));
    }
}
