// src/acquire/download.rs

//! Direct HTTP downloads

use crate::error::{Error, Result};
use crate::filesystem::check_dir_name;
use reqwest::blocking::Client;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Connect timeout for downloads
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a single download; vendor archives run to several hundred MB
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Maximum attempts on transport errors
const MAX_RETRIES: u32 = 3;

const RETRY_DELAY_MS: u64 = 1000;

/// Last path segment of a URL, used as the local file name
pub fn url_basename(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| Error::DownloadFailed {
        url: url.to_string(),
        reason: format!("invalid URL: {}", e),
    })?;

    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string()))
        .ok_or_else(|| Error::DownloadFailed {
            url: url.to_string(),
            reason: "URL has no file name".to_string(),
        })?;

    check_dir_name(&name).map_err(|e| Error::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(name)
}

/// Blocking HTTP downloader with retry on transport errors
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    max_retries: u32,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(concat!("libpack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Download `url` into `dest_dir` under its basename, returning the file path
    ///
    /// A non-2xx status fails immediately; transport errors are retried.
    pub fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let dest = dest_dir.join(url_basename(url)?);
        let failed = |reason: String| Error::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        fs::create_dir_all(dest_dir)?;
        info!("Downloading {} to {}", url, dest.display());

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(mut response) => {
                    if !response.status().is_success() {
                        return Err(failed(format!("HTTP {}", response.status())));
                    }

                    // Only a complete transfer is moved into place
                    let mut staged = NamedTempFile::new_in(dest_dir).map_err(|e| {
                        failed(format!("cannot create file in {}: {}", dest_dir.display(), e))
                    })?;
                    let written = io::copy(&mut response, staged.as_file_mut())
                        .map_err(|e| failed(format!("transfer interrupted: {}", e)))?;

                    staged.persist(&dest).map_err(|e| {
                        failed(format!("cannot move download to {}: {}", dest.display(), e.error))
                    })?;

                    info!("Downloaded {} bytes to {}", written, dest.display());
                    return Ok(dest);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(failed(format!("{} (after {} attempts)", e, attempt)));
                    }
                    warn!("Download attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}
