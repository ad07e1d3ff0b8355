// src/config.rs

//! Build configuration derived from the invoking user's environment

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Configuration for a single pipeline run
///
/// The cache directory and repository config live under the invoking
/// user's `~/.apkg` directory; the repository config is copied into the
/// build root so in-sandbox tooling resolves packages consistently.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Package cache handed to the dependency installer
    pub cache_dir: PathBuf,
    /// Repository list copied into the build root before the script runs
    pub repos_config: PathBuf,
    /// Whether to enter a chroot for the build function
    ///
    /// Disabled for unprivileged runs: binds and the repository config
    /// copy are skipped and the build function runs with the process
    /// working directory switched to the build root instead.
    pub use_isolation: bool,
}

impl BuildConfig {
    /// Derive the configuration from the invoking user's home directory
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Configuration("cannot determine home directory".to_string()))?;
        let apkg = home.join(".apkg");

        Ok(Self {
            cache_dir: apkg.join("cache"),
            repos_config: apkg.join("repos.toml"),
            use_isolation: true,
        })
    }
}
