// src/installer.rs

//! Build-dependency installation boundary
//!
//! Dependency resolution and installation belong to the external `pax`
//! tool; this trait keeps the pipeline decoupled from it while still
//! being able to populate the build root before the script's build
//! function runs. References handed to an installer are fully resolved
//! `name@version` pairs.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Installs resolved package references into a target root
pub trait DependencyInstaller {
    /// Install `refs` into `root`, using `cache_dir` for downloads
    fn install_multiple(
        &self,
        root: &Path,
        cache_dir: &Path,
        refs: &[String],
        verbose: bool,
    ) -> Result<()>;
}

/// Installer backed by the `pax` command-line tool
pub struct PaxInstaller;

impl DependencyInstaller for PaxInstaller {
    fn install_multiple(
        &self,
        root: &Path,
        cache_dir: &Path,
        refs: &[String],
        verbose: bool,
    ) -> Result<()> {
        if refs.is_empty() {
            debug!("No build dependencies to install");
            return Ok(());
        }

        info!("Installing build dependencies: {}", refs.join(", "));

        let mut cmd = Command::new("pax");
        cmd.arg("install")
            .arg("--root")
            .arg(root)
            .arg("--cache")
            .arg(cache_dir);
        if verbose {
            cmd.arg("--verbose");
        }
        cmd.args(refs);

        let output = cmd
            .output()
            .map_err(|e| Error::Process(format!("failed to run pax: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Process(format!(
                "pax install failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(())
    }
}

/// A no-op installer that assumes all dependencies are satisfied
///
/// Use this when the build root is pre-populated or when running tests.
pub struct NoopInstaller;

impl DependencyInstaller for NoopInstaller {
    fn install_multiple(
        &self,
        _root: &Path,
        _cache_dir: &Path,
        _refs: &[String],
        _verbose: bool,
    ) -> Result<()> {
        Ok(())
    }
}
