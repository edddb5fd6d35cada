// src/config.rs
//! Engine configuration
//!
//! Loaded from a TOML file with the following sections:
//! - top level - install root and derived state paths
//! - [network] - user agent, timeouts, repository credentials
//! - [network.proxy] - explicit HTTP proxy
//! - [signatures] - detached signature verification and trusted keys
//!
//! Credentials may also come from the environment so they need not be
//! written to disk.

use crate::acquire::{Credentials, KeySpec, ProxySettings, TransportConfig};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_REPOSITORY_USER: &str = "ESA_REPOSITORY_USER";
pub const ENV_REPOSITORY_PASSWORD: &str = "ESA_REPOSITORY_PASSWORD";
pub const ENV_PROXY_USER: &str = "ESA_PROXY_USER";
pub const ENV_PROXY_PASSWORD: &str = "ESA_PROXY_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Root of the installed product
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    /// Staging area for downloads; `<root>/tmp/esa-install` when unset
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default)]
    pub registry_path: Option<PathBuf>,

    #[serde(default)]
    pub checksum_manifest: Option<PathBuf>,

    #[serde(default)]
    pub fingerprint_path: Option<PathBuf>,

    /// Roll back every group of a failed transaction, not only the failing one
    #[serde(default)]
    pub rollback_all: bool,

    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub signatures: SignatureSection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            temp_dir: None,
            registry_path: None,
            checksum_manifest: None,
            fingerprint_path: None,
            rollback_all: false,
            network: NetworkSection::default(),
            signatures: SignatureSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Repository user for Basic auth
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub proxy: Option<ProxySection>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            user: None,
            password: None,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxySection {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureSection {
    /// Check detached signatures after download
    #[serde(default)]
    pub verify: bool,

    /// Fail the transaction on an unverified signature instead of warning
    #[serde(default)]
    pub abort_on_failure: bool,

    #[serde(default)]
    pub keys: Vec<KeySpec>,
}

fn default_install_root() -> PathBuf {
    PathBuf::from("/opt/esa")
}

fn default_user_agent() -> String {
    crate::acquire::client::DEFAULT_USER_AGENT.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_timeout() -> u64 {
    300
}

impl EngineConfig {
    /// Load from a TOML file and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let mut config = Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse configuration: {e}")))
    }

    /// Default configuration rooted at `install_root`
    pub fn for_root(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.install_root.as_os_str().is_empty() {
            return Err(Error::ConfigError("install_root must not be empty".to_string()));
        }
        if self.network.timeout_secs == 0 {
            return Err(Error::ConfigError("network.timeout_secs must be positive".to_string()));
        }
        if let Some(proxy) = &self.network.proxy
            && proxy.host.trim().is_empty()
        {
            return Err(Error::ConfigError("network.proxy.host must not be empty".to_string()));
        }
        if self.signatures.verify && self.signatures.keys.is_empty() {
            return Err(Error::ConfigError(
                "signatures.verify is set but no signatures.keys are configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Fill credentials and proxy from the environment
    ///
    /// Values already present in the file win. `https_proxy` is only
    /// consulted when no proxy is configured.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = &mut self.network;
        if network.user.is_none() {
            network.user = lookup(ENV_REPOSITORY_USER);
        }
        if network.password.is_none() {
            network.password = lookup(ENV_REPOSITORY_PASSWORD);
        }

        if network.proxy.is_none()
            && let Some(value) = lookup("https_proxy").or_else(|| lookup("HTTPS_PROXY"))
        {
            network.proxy = parse_proxy(&value);
        }

        if let Some(proxy) = network.proxy.as_mut() {
            if proxy.user.is_none() {
                proxy.user = lookup(ENV_PROXY_USER);
            }
            if proxy.password.is_none() {
                proxy.password = lookup(ENV_PROXY_PASSWORD);
            }
        }
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| self.install_root.join("tmp/esa-install"))
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.install_root.join("lib/versions")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.registry_path
            .clone()
            .unwrap_or_else(|| self.versions_dir().join("installed.db"))
    }

    pub fn checksum_manifest(&self) -> PathBuf {
        self.checksum_manifest
            .clone()
            .unwrap_or_else(|| self.versions_dir().join("checksums.json"))
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.fingerprint_path
            .clone()
            .unwrap_or_else(|| self.versions_dir().join("service.fingerprint"))
    }

    pub fn repository_credentials(&self) -> Option<Credentials> {
        self.network
            .user
            .as_ref()
            .map(|user| Credentials::new(user.clone(), self.network.password.clone()))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            user_agent: self.network.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.network.connect_timeout_secs),
            timeout: Duration::from_secs(self.network.timeout_secs),
            proxy: self.network.proxy.as_ref().map(|p| ProxySettings {
                host: p.host.clone(),
                port: p.port,
                credentials: p
                    .user
                    .as_ref()
                    .map(|user| Credentials::new(user.clone(), p.password.clone())),
            }),
            credentials: self.repository_credentials(),
        }
    }
}

/// `host:port` or `scheme://[user:pass@]host:port[/]`
fn parse_proxy(value: &str) -> Option<ProxySection> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let with_scheme = if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{value}")
    };
    let url = url::Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;
    let user = (!url.username().is_empty()).then(|| url.username().to_string());
    Some(ProxySection {
        host,
        port,
        user,
        password: url.password().map(str::to_string),
    })
}
