// src/pipeline/mod.rs

//! Pipeline orchestrator
//!
//! Sequences one build from script to archive:
//!
//! 1. create the build root and its directory skeleton
//! 2. bind the working directory at `/mnt` and copy the repository
//!    config into the root (isolation only)
//! 3. load the script and install its `build_dependencies` into the root
//! 4. enter the root, run `build()`, leave the root
//! 5. extract the package descriptor and write `package.toml`
//! 6. pack the staging tree into the output archive
//!
//! Success and every failure share one teardown path: binds are undone
//! in reverse order and the root is removed before the result is
//! returned. Teardown problems are logged but never mask the error that
//! triggered them. The sandbox is never re-entered after step 4.

use crate::archive;
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::installer::{DependencyInstaller, PaxInstaller};
use crate::manifest::PackageRoot;
use crate::sandbox::{self, BuildRoot};
use crate::script::ScriptHost;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Runs one script-to-archive build
pub struct Pipeline {
    config: BuildConfig,
    installer: Box<dyn DependencyInstaller>,
}

impl Pipeline {
    /// Create a pipeline using the real `pax` installer
    pub fn new(config: BuildConfig) -> Self {
        Self::with_installer(config, Box::new(PaxInstaller))
    }

    /// Create a pipeline with a custom dependency installer
    pub fn with_installer(config: BuildConfig, installer: Box<dyn DependencyInstaller>) -> Self {
        Self { config, installer }
    }

    /// Build the script at `script_path` into the archive at
    /// `archive_path`
    pub fn run(&self, script_path: &Path, archive_path: &Path) -> Result<()> {
        // Resolve the archive path up front; the build may move the
        // process working directory.
        let archive_path = absolute(archive_path)?;

        let mut root = BuildRoot::create()?;
        let result = self.run_stages(&mut root, script_path, &archive_path);

        // Shared teardown path for success and failure; never masks the
        // originating error.
        if let Err(e) = root.teardown() {
            match &result {
                Ok(()) => return Err(e),
                Err(_) => warn!("Failed to remove build root: {}", e),
            }
        }

        result
    }

    fn run_stages(
        &self,
        root: &mut BuildRoot,
        script_path: &Path,
        archive_path: &Path,
    ) -> Result<()> {
        root.setup_skeleton()?;

        if self.config.use_isolation {
            let cwd = std::env::current_dir()?;
            root.bind(&cwd, "mnt")?;
            self.copy_repos_config(root.path())?;
        }

        let host = ScriptHost::load(script_path)?;

        let build_deps = build_dependency_refs(&host)?;
        self.installer.install_multiple(
            root.path(),
            &self.config.cache_dir,
            &build_deps,
            true,
        )?;

        info!("Running build()...");
        if self.config.use_isolation {
            self.build_isolated(root.path(), &host)?;
        } else {
            self.build_direct(root.path(), &host)?;
        }

        let descriptor = PackageRoot::extract(&host)?;
        let staging = root.path().join("pkg");
        descriptor.write(&staging)?;

        archive::pack(&staging, archive_path)?;
        info!(
            "Built {} {} -> {}",
            descriptor.package.name,
            descriptor.package.version,
            archive_path.display()
        );

        Ok(())
    }

    /// Run `build()` inside a chroot into the build root
    ///
    /// The root is always exited before any error from inside
    /// propagates, so the process never keeps a changed root on error
    /// paths.
    fn build_isolated(&self, root: &Path, host: &ScriptHost) -> Result<()> {
        let guard = sandbox::enter(root)?;
        let build_result = host.invoke("build");
        let exit_result = guard.exit();

        build_result?;
        exit_result
    }

    /// Run `build()` without a chroot, with the working directory moved
    /// into the build root so relative paths land in the same places
    fn build_direct(&self, root: &Path, host: &ScriptHost) -> Result<()> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(root)?;

        let build_result = host.invoke("build");
        let restore_result = std::env::set_current_dir(&previous);

        build_result?;
        restore_result?;
        Ok(())
    }

    /// Copy the user's repository list into the root so in-sandbox
    /// tooling resolves packages consistently
    fn copy_repos_config(&self, root: &Path) -> Result<()> {
        let source = &self.config.repos_config;
        fs::copy(source, root.join("repos.toml")).map_err(|e| {
            Error::Configuration(format!(
                "cannot copy repository config '{}': {}",
                source.display(),
                e
            ))
        })?;
        debug!("Copied repository config from {}", source.display());
        Ok(())
    }
}

/// Read the script's `build_dependencies` mapping as resolved
/// `name@version` references
///
/// Every reference must pin an exact version; wildcards cannot be
/// installed into a fresh root.
fn build_dependency_refs(host: &ScriptHost) -> Result<Vec<String>> {
    let map = host.global_string_map("build_dependencies")?;

    for (name, version) in &map {
        if version.is_empty() || version.contains('*') {
            return Err(Error::Configuration(format!(
                "build dependency '{}' must pin an exact version, got '{}'",
                name, version
            )));
        }
    }

    Ok(map
        .into_iter()
        .map(|(name, version)| format!("{}@{}", name, version))
        .collect())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
