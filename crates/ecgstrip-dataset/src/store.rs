//! Object-store access with local caching.
//!
//! Fetches bucket objects over the public HTTPS endpoint and mirrors them
//! under a downloads directory, preserving the bucket-relative path. Callers
//! go through [`ObjectStore::fetch`], which only touches the network when the
//! local copy is missing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP object fetcher mirroring a bucket into a local directory.
#[derive(Debug)]
pub struct ObjectStore {
    bucket: String,
    downloads_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl ObjectStore {
    pub fn new(bucket: &str, downloads_dir: &Path) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            bucket: bucket.to_string(),
            downloads_dir: downloads_dir.to_path_buf(),
            client,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Local path an object is (or would be) cached at.
    pub fn local_path(&self, name: &str) -> PathBuf {
        self.downloads_dir.join(name)
    }

    /// Cached path of an object, if present.
    pub fn is_cached(&self, name: &str) -> Option<PathBuf> {
        let path = self.local_path(name);
        path.is_file().then_some(path)
    }

    /// Return the local path of an object, downloading it first if missing.
    pub fn fetch(&self, name: &str) -> Result<PathBuf> {
        if let Some(path) = self.is_cached(name) {
            tracing::debug!("using cached object: {}", path.display());
            return Ok(path);
        }
        self.download(name)
    }

    /// Download an object unconditionally, overwriting any local copy.
    pub fn download(&self, name: &str) -> Result<PathBuf> {
        let url = format!("https://storage.googleapis.com/{}/{}", self.bucket, name);
        tracing::info!("downloading {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed to request {url}"))?;
        if !response.status().is_success() {
            bail!("download failed: {} for {}", response.status(), url);
        }
        let body = response.bytes().context("failed to read response body")?;

        let path = self.local_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, &body).with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!("cached {} ({} bytes)", path.display(), body.len());
        Ok(path)
    }
}
