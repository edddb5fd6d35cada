// src/acquire/client.rs

//! Artifact transport
//!
//! HTTP(S) through reqwest's blocking client (explicit proxy, Basic auth,
//! user agent, connect timeout) and `file://` URLs for directory
//! repositories. Bodies are streamed to disk in 8 KiB chunks; the caller gets
//! the cumulative byte count after every chunk.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

pub const DEFAULT_USER_AGENT: &str = concat!("esa-install/", env!("CARGO_PKG_VERSION"));

/// Username and password for Basic auth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: Option<String>) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }
}

/// Explicit HTTP proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl ProxySettings {
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub proxy: Option<ProxySettings>,
    /// Repository credentials used when a request carries none
    pub credentials: Option<Credentials>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
            proxy: None,
            credentials: None,
        }
    }
}

/// Downloads artifacts over HTTP(S) or from `file://` URLs
pub struct Transport {
    client: Client,
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout);

        if let Some(proxy) = &config.proxy {
            let mut p = reqwest::Proxy::all(proxy.url())
                .map_err(|e| Error::ConfigError(format!("Invalid proxy {}: {e}", proxy.url())))?;
            if let Some(creds) = &proxy.credentials {
                p = p.basic_auth(&creds.user, creds.password.as_deref().unwrap_or(""));
            }
            debug!("Using proxy {}", proxy.url());
            builder = builder.proxy(p);
        }

        let client = builder
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Download `url` to `dest`, failing if the source does not exist
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        credentials: Option<&Credentials>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64> {
        match self.download_optional(url, dest, credentials, progress)? {
            Some(bytes) => Ok(bytes),
            None => Err(Error::DownloadError(format!("{url} not found"))),
        }
    }

    /// Download `url` to `dest`; `Ok(None)` when the source does not exist
    ///
    /// `dest` is only created once the source is known to exist.
    pub fn download_optional(
        &self,
        url: &str,
        dest: &Path,
        credentials: Option<&Credentials>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Option<u64>> {
        let Some((mut reader, total)) = self.open(url, credentials)? else {
            return Ok(None);
        };

        let cannot_write = |reason: String| Error::CannotWrite {
            source_url: url.to_string(),
            destination: dest.to_path_buf(),
            reason,
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| cannot_write(e.to_string()))?;
        }
        let mut file = File::create(dest).map_err(|e| cannot_write(e.to_string()))?;

        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        loop {
            let n = reader
                .read(&mut buffer)
                .map_err(|e| Error::DownloadError(format!("Failed to read {url}: {e}")))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])
                .map_err(|e| cannot_write(e.to_string()))?;
            downloaded += n as u64;
            progress(downloaded, total);
        }
        file.flush().map_err(|e| cannot_write(e.to_string()))?;

        info!("Downloaded {} ({} bytes)", url, downloaded);
        Ok(Some(downloaded))
    }

    /// Fetch a small resource (keys, signatures) into memory
    pub fn fetch_bytes(&self, url: &str, credentials: Option<&Credentials>) -> Result<Option<Vec<u8>>> {
        let Some((mut reader, _)) = self.open(url, credentials)? else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| Error::DownloadError(format!("Failed to read {url}: {e}")))?;
        Ok(Some(bytes))
    }

    #[allow(clippy::type_complexity)]
    fn open(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Option<(Box<dyn Read>, Option<u64>)>> {
        let parsed = Url::parse(url).map_err(|e| Error::BadArgument(format!("Invalid URL {url}: {e}")))?;

        match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| Error::BadArgument(format!("Invalid file URL {url}")))?;
                if !path.is_file() {
                    return Ok(None);
                }
                let file = File::open(&path)
                    .map_err(|e| Error::DownloadError(format!("Failed to open {}: {e}", path.display())))?;
                let len = file.metadata().ok().map(|m| m.len());
                Ok(Some((Box::new(file), len)))
            }
            "http" | "https" => {
                let (clean, embedded) = split_user_info(parsed);
                let creds = credentials
                    .cloned()
                    .or(embedded)
                    .or_else(|| self.config.credentials.clone());

                let mut request = self.client.get(clean.as_str());
                if let Some(c) = &creds {
                    request = request.basic_auth(&c.user, c.password.as_deref());
                }

                let response = request
                    .send()
                    .map_err(|e| Error::DownloadError(format!("Failed to fetch {clean}: {e}")))?;

                if response.status() == StatusCode::NOT_FOUND {
                    debug!("{} returned 404", clean);
                    return Ok(None);
                }
                if !response.status().is_success() {
                    return Err(Error::DownloadError(format!(
                        "HTTP {} from {}",
                        response.status(),
                        clean
                    )));
                }

                let len = response.content_length();
                Ok(Some((Box::new(response), len)))
            }
            other => Err(Error::BadArgument(format!("Unsupported URL scheme {other} in {url}"))),
        }
    }
}

/// Strip user-info from a URL, returning it as credentials
fn split_user_info(mut url: Url) -> (Url, Option<Credentials>) {
    if url.username().is_empty() {
        return (url, None);
    }
    let creds = Credentials::new(url.username(), url.password().map(str::to_string));
    // Only fails for cannot-be-a-base URLs, which http(s) never are
    let _ = url.set_username("");
    let _ = url.set_password(None);
    (url, Some(creds))
}

/// `file://` URL for a local path
pub fn file_url(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|_| Error::BadArgument(format!("Cannot build URL for {}", path.display())))
}
