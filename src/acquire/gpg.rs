// src/acquire/gpg.rs

//! PGP key validation and detached signature verification
//!
//! Keys are validated before they enter the ring: the key id must appear in
//! the configured id, the certificate must not be revoked, and its primary
//! key must not be past its expiry. An invalid default key is fatal; any
//! other invalid key is skipped with a warning.

use crate::acquire::client::Transport;
use crate::error::{Error, Result};
use openpgp::cert::Cert;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::types::RevocationStatus;
use sequoia_openpgp as openpgp;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// A configured public key
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct KeySpec {
    /// Expected key id (16 hex digits) or full fingerprint
    pub id: String,
    /// File path or URL of the armored key
    pub location: String,
    /// The distribution's own key
    #[serde(default)]
    pub default: bool,
}

/// An artifact paired with its detached signature
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    pub asset: String,
    pub file: PathBuf,
    pub signature: PathBuf,
}

/// Check `cert` against the expected id, revocation and expiry
pub fn validate_key(
    cert: &Cert,
    expected_id: &str,
    policy: &StandardPolicy<'_>,
    now: SystemTime,
) -> std::result::Result<(), String> {
    let key_id = cert.keyid().to_hex();
    let expected = expected_id.trim().trim_start_matches("0x").to_ascii_uppercase();
    if !expected.contains(&key_id) {
        return Err(format!("key id {key_id} does not match {expected_id}"));
    }

    if let RevocationStatus::Revoked(_) = cert.revocation_status(policy, now) {
        return Err("key has been revoked".to_string());
    }

    let valid = cert
        .with_policy(policy, now)
        .map_err(|e| format!("key is not valid under the standard policy: {e}"))?;
    if let Some(expiry) = valid.primary_key().key_expiration_time()
        && expiry <= now
    {
        let when: chrono::DateTime<chrono::Utc> = expiry.into();
        return Err(format!("key expired on {}", when.format("%Y-%m-%d")));
    }

    Ok(())
}

/// Validated public keys
pub struct KeyRing {
    certs: Vec<Cert>,
    policy: StandardPolicy<'static>,
}

impl Default for KeyRing {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRing {
    pub fn new() -> Self {
        Self {
            certs: Vec::new(),
            policy: StandardPolicy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Load and validate every configured key
    ///
    /// Locations with a URL scheme go through `transport`; anything else is a
    /// file path.
    pub fn load(specs: &[KeySpec], transport: Option<&Transport>) -> Result<Self> {
        let mut ring = Self::new();
        for spec in specs {
            let data = match read_key(spec, transport) {
                Ok(data) => data,
                Err(e) if spec.default => return Err(e),
                Err(e) => {
                    warn!("Skipping key {}: {}", spec.id, e);
                    continue;
                }
            };
            ring.add_key(spec, &data)?;
        }
        info!("Loaded {} of {} signing keys", ring.len(), specs.len());
        Ok(ring)
    }

    /// Validate and add one key; `Ok(false)` if a non-default key was rejected
    pub fn add_key(&mut self, spec: &KeySpec, data: &[u8]) -> Result<bool> {
        let verdict = Cert::from_bytes(data)
            .map_err(|e| format!("cannot parse key: {e}"))
            .and_then(|cert| {
                validate_key(&cert, &spec.id, &self.policy, SystemTime::now()).map(|()| cert)
            });

        match verdict {
            Ok(cert) => {
                debug!("Accepted key {} ({})", spec.id, cert.fingerprint());
                self.certs.push(cert);
                Ok(true)
            }
            Err(reason) if spec.default => Err(Error::InvalidKey {
                key_id: spec.id.clone(),
                reason,
            }),
            Err(reason) => {
                warn!("Public key {} is not valid: {}", spec.id, reason);
                Ok(false)
            }
        }
    }

    /// Verify a detached signature over `file`
    pub fn verify_detached(&self, file: &Path, signature: &Path) -> Result<()> {
        let message = std::fs::read(file)?;
        let signature_data = std::fs::read(signature)?;

        let pile = openpgp::PacketPile::from_bytes(&signature_data)
            .map_err(|e| Error::SignatureUnverified(format!("cannot parse {}: {e}", signature.display())))?;

        for packet in pile.descendants() {
            if let openpgp::Packet::Signature(sig) = packet {
                for cert in &self.certs {
                    for key in cert.keys().with_policy(&self.policy, None).for_signing() {
                        if sig.clone().verify_message(key.key(), &message).is_ok() {
                            debug!("{} signed by {}", file.display(), cert.fingerprint());
                            return Ok(());
                        }
                    }
                }
            }
        }

        Err(Error::SignatureUnverified(format!(
            "no trusted signature on {}",
            file.display()
        )))
    }

    /// Verify every artifact; returns the assets that failed
    pub fn verify_all(&self, artifacts: &[SignedArtifact]) -> Vec<String> {
        let mut failed = Vec::new();
        for artifact in artifacts {
            if let Err(e) = self.verify_detached(&artifact.file, &artifact.signature) {
                warn!("Signature check failed for {}: {}", artifact.asset, e);
                failed.push(artifact.asset.clone());
            }
        }
        failed
    }
}

fn read_key(spec: &KeySpec, transport: Option<&Transport>) -> Result<Vec<u8>> {
    if spec.location.contains("://") {
        let transport = transport.ok_or_else(|| {
            Error::ConfigError(format!("no transport available to fetch key {}", spec.location))
        })?;
        return transport
            .fetch_bytes(&spec.location, None)?
            .ok_or_else(|| Error::DownloadError(format!("key {} not found", spec.location)));
    }
    Ok(std::fs::read(&spec.location)?)
}
