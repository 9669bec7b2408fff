// Copyright (C) 2026 Semantc Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terraform binary installation.
//!
//! Fetches the release archive, unpacks it into the install directory,
//! marks the binary executable and verifies it runs. Safe to call on every
//! invocation: an already-verified install short-circuits the download.
//! The install location is returned to the caller and threaded to the
//! runner explicitly; the ambient `PATH` is never touched.

use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Timeout for the post-install verification subcommand.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from toolchain setup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolSetupError {
    /// Release archive download failed.
    #[error("download failed: {0}")]
    Download(String),

    /// Archive could not be unpacked.
    #[error("unpack failed: {0}")]
    Unpack(String),

    /// The installed binary did not pass verification.
    #[error("verification failed: {0}")]
    Verify(String),

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for toolchain provisioning.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Ensure a working terraform binary is installed; returns its path.
    async fn ensure_installed(&self) -> Result<PathBuf, ToolSetupError>;
}

/// Installer fetching official release archives.
pub struct HashicorpInstaller {
    client: reqwest::Client,
    version: String,
    base_url: String,
    install_dir: PathBuf,
}

impl HashicorpInstaller {
    /// Create an installer for the given release.
    pub fn new(version: &str, base_url: &str, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            version: version.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            install_dir: install_dir.into(),
        }
    }

    fn archive_url(&self) -> String {
        format!(
            "{base}/{v}/terraform_{v}_linux_amd64.zip",
            base = self.base_url,
            v = self.version
        )
    }

    async fn download(&self) -> Result<Vec<u8>, ToolSetupError> {
        let url = self.archive_url();
        info!(url = %url, "Downloading terraform release");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolSetupError::Download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ToolSetupError::Download(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }
        Ok(response
            .bytes()
            .await
            .map_err(|e| ToolSetupError::Download(e.to_string()))?
            .to_vec())
    }

    /// Run `terraform version` and require exit 0.
    async fn verify(binary: &Path) -> Result<(), ToolSetupError> {
        let output = tokio::time::timeout(
            VERIFY_TIMEOUT,
            Command::new(binary)
                .arg("version")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ToolSetupError::Verify("version query timed out".to_string()))?
        .map_err(|e| ToolSetupError::Verify(e.to_string()))?;

        if !output.status.success() {
            return Err(ToolSetupError::Verify(format!(
                "version query exited with {}",
                output.status.code().unwrap_or(-1)
            )));
        }
        let version_line = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        debug!(version = %version_line, "Terraform verified");
        Ok(())
    }
}

#[async_trait]
impl Toolchain for HashicorpInstaller {
    async fn ensure_installed(&self) -> Result<PathBuf, ToolSetupError> {
        let binary = self.install_dir.join("terraform");

        // Warm instance: a verified binary is already in place.
        if binary.exists() && Self::verify(&binary).await.is_ok() {
            debug!(path = %binary.display(), "Terraform already installed");
            return Ok(binary);
        }

        tokio::fs::create_dir_all(&self.install_dir).await?;
        let archive = self.download().await?;

        let install_dir = self.install_dir.clone();
        tokio::task::spawn_blocking(move || unpack_archive(&archive, &install_dir))
            .await
            .map_err(|e| ToolSetupError::Unpack(e.to_string()))??;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755))?;
        }

        Self::verify(&binary).await?;
        info!(path = %binary.display(), version = %self.version, "Terraform installed");
        Ok(binary)
    }
}

/// Unpack every archive entry into `install_dir`.
fn unpack_archive(archive: &[u8], install_dir: &Path) -> Result<(), ToolSetupError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| ToolSetupError::Unpack(e.to_string()))?;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ToolSetupError::Unpack(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(ToolSetupError::Unpack(format!(
                "unsafe entry name: {}",
                entry.name()
            )));
        };
        let target = install_dir.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Toolchain double for tests: returns a fixed path or a scripted failure.
pub struct MockToolchain {
    binary: PathBuf,
    fail: bool,
}

impl MockToolchain {
    /// Toolchain that reports the given binary as installed.
    pub fn installed(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            fail: false,
        }
    }

    /// Toolchain whose setup always fails.
    pub fn failing() -> Self {
        Self {
            binary: PathBuf::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl Toolchain for MockToolchain {
    async fn ensure_installed(&self) -> Result<PathBuf, ToolSetupError> {
        if self.fail {
            return Err(ToolSetupError::Download("simulated failure".to_string()));
        }
        Ok(self.binary.clone())
    }
}
