// src/commands/verify.rs
//! Integrity check of a local artifact

use anyhow::{Context, Result};
use esa_install::acquire::{KeyRing, SIGNATURE_EXTENSION, Transport};
use esa_install::hash::{self, HashAlgorithm};
use esa_install::{EngineConfig, Error};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Check `artifact` against a digest (explicit or sidecar) and its signature
pub fn cmd_verify(
    config: &EngineConfig,
    artifact: &Path,
    digest: Option<&str>,
    algorithm: &str,
    signature: Option<&Path>,
) -> Result<()> {
    if !artifact.is_file() {
        anyhow::bail!("{} is not a file", artifact.display());
    }
    let asset = artifact.display().to_string();

    let mut expected = Vec::new();
    match digest {
        Some(value) => {
            let algorithm: HashAlgorithm = algorithm.parse().map_err(anyhow::Error::msg)?;
            expected.push((algorithm, value.to_string()));
        }
        None => {
            for algorithm in HashAlgorithm::ALL {
                let sidecar = hash::sidecar_path(artifact, algorithm);
                if !sidecar.exists() {
                    continue;
                }
                let content = std::fs::read_to_string(&sidecar)
                    .with_context(|| format!("Failed to read {}", sidecar.display()))?;
                match hash::parse_sidecar(&content) {
                    Some(value) => expected.push((algorithm, value.to_string())),
                    None => warn!("Empty sidecar {}", sidecar.display()),
                }
            }
        }
    }

    if expected.is_empty() {
        println!("No checksum available for {}", asset);
    }
    for (algorithm, value) in &expected {
        let actual = hash::hash_file(*algorithm, artifact)?;
        if !hash::digests_equal(value, &actual) {
            return Err(Error::ChecksumMismatch {
                asset,
                algorithm: algorithm.to_string(),
                expected: value.clone(),
                actual,
            }
            .into());
        }
        println!("{:<7} OK", algorithm);
    }

    let signature = signature.map(Path::to_path_buf).or_else(|| {
        let mut path = artifact.as_os_str().to_os_string();
        path.push(".");
        path.push(SIGNATURE_EXTENSION);
        Some(PathBuf::from(path)).filter(|p| p.exists())
    });
    let Some(signature) = signature else {
        debug!("No detached signature for {}", asset);
        return Ok(());
    };

    if config.signatures.keys.is_empty() {
        anyhow::bail!(
            "{} has a signature but no signing keys are configured",
            asset
        );
    }
    let transport = Transport::new(config.transport_config())?;
    let keyring = KeyRing::load(&config.signatures.keys, Some(&transport))?;
    keyring.verify_detached(artifact, &signature)?;
    println!("signature OK ({})", signature.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("a.esa");
        std::fs::write(&artifact, b"payload").unwrap();
        std::fs::write(
            hash::sidecar_path(&artifact, HashAlgorithm::Sha1),
            "0000000000000000000000000000000000000000",
        )
        .unwrap();

        let config = EngineConfig::for_root(dir.path());
        let err = cmd_verify(&config, &artifact, None, "sha256", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_explicit_digest_passes() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("a.esa");
        std::fs::write(&artifact, b"payload").unwrap();

        let config = EngineConfig::for_root(dir.path());
        let digest = hash::sha256(b"payload");
        cmd_verify(&config, &artifact, Some(&digest), "sha256", None).unwrap();
    }
}
