// src/sandbox/mod.rs

//! Disposable build root and chroot boundary
//!
//! A [`BuildRoot`] is a uniquely named directory under the system temp
//! location that acts as the filesystem root for one build. External
//! directories are exposed inside it with bind mounts, and the build
//! function runs after a chroot into it.
//!
//! Release discipline: binds are undone in reverse creation order before
//! the root is removed, and removal is always attempted even when an
//! unmount fails. Dropping a [`BuildRoot`] or a [`SandboxGuard`] performs
//! the same release best-effort, so the pipeline cannot leak a mount
//! point or a changed process root while unwinding.

use crate::error::{Error, Result};
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use std::ffi::CString;
use std::fs::{self, File};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Directory skeleton created inside every build root so a shell can run
/// after the chroot
const SKELETON_DIRS: &[&str] = &[
    "dev", "etc", "proc", "sys", "tmp", "usr", "lib", "lib64", "bin", "sbin", "var", "mnt", "pkg",
];

/// Device node placeholders created under `dev/` (bind targets for the
/// host nodes, or plain files when running without privileges)
const DEVICE_NODES: &[&str] = &["null", "zero", "urandom", "random"];

/// A disposable isolated root for one build
pub struct BuildRoot {
    dir: Option<TempDir>,
    path: PathBuf,
    /// Absolute bind targets inside the root, in creation order
    binds: Vec<PathBuf>,
}

impl BuildRoot {
    /// Allocate a uniquely named root under the system temp directory
    ///
    /// The name carries a random suffix so concurrent builds on one host
    /// never collide.
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("apkgbuild-")
            .tempdir()?;
        let path = dir.path().to_path_buf();
        debug!("Created build root at {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
            binds: Vec::new(),
        })
    }

    /// Path of the root on the host filesystem
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory skeleton and device node placeholders
    ///
    /// Must run before [`enter`] so the chrooted shell finds `/dev`,
    /// `/tmp` and friends. The `pkg` staging directory is left
    /// world-writable so the build function can install into it
    /// regardless of which uid runs inside the root.
    pub fn setup_skeleton(&self) -> Result<()> {
        for dir in SKELETON_DIRS {
            fs::create_dir_all(self.path.join(dir))?;
        }

        let pkg = self.path.join("pkg");
        fs::set_permissions(&pkg, fs::Permissions::from_mode(0o777))?;

        let dev = self.path.join("dev");
        for node in DEVICE_NODES {
            let node_path = dev.join(node);
            if !node_path.exists() {
                File::create(&node_path)?;
            }
        }

        Ok(())
    }

    /// Expose a host directory inside the root at the given relative path
    ///
    /// The target directory is created if absent. The bind is recorded so
    /// teardown can undo it in reverse order.
    pub fn bind(&mut self, host_path: &Path, inner_rel: &str) -> Result<()> {
        let target = self.path.join(inner_rel.trim_start_matches('/'));
        fs::create_dir_all(&target)?;

        mount::<Path, Path, str, str>(Some(host_path), &target, None, MsFlags::MS_BIND, None)
            .map_err(|e| {
                Error::Mount(format!(
                    "bind {} -> {} failed: {}",
                    host_path.display(),
                    target.display(),
                    e
                ))
            })?;

        debug!("Bound {} at {}", host_path.display(), target.display());
        self.binds.push(target);
        Ok(())
    }

    /// Unmount all recorded binds in reverse creation order
    ///
    /// Best-effort: failures are collected for diagnostics and never stop
    /// the remaining unmounts.
    fn unbind_all(&mut self) -> Vec<(PathBuf, Error)> {
        let mut failures = Vec::new();
        while let Some(target) = self.binds.pop() {
            if let Err(e) = umount2(&target, MntFlags::MNT_DETACH) {
                failures.push((
                    target,
                    Error::Mount(format!("unmount failed: {}", e)),
                ));
            }
        }
        failures
    }

    /// Undo all binds and remove the root
    ///
    /// Unbind failures are reported but do not prevent the removal
    /// attempt; the returned result reflects the removal outcome.
    pub fn teardown(mut self) -> Result<()> {
        for (target, e) in self.unbind_all() {
            warn!("Failed to unbind {}: {}", target.display(), e);
        }

        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        debug!("Removed build root at {}", self.path.display());
        Ok(())
    }
}

impl Drop for BuildRoot {
    fn drop(&mut self) {
        if self.dir.is_none() {
            return;
        }
        // Unwinding without an explicit teardown: still undo the binds
        // before TempDir removes the tree.
        for (target, e) in self.unbind_all() {
            warn!("Failed to unbind {}: {}", target.display(), e);
        }
    }
}

/// Restores the original process root when consumed or dropped
///
/// Returned by [`enter`]; holds a descriptor on the host root directory
/// which is the only escape hatch once the chroot has happened.
pub struct SandboxGuard {
    old_root: Option<File>,
}

/// Change the process filesystem root to the build root
///
/// Opens a descriptor on the current `/` first so the change is
/// reversible, then chroots and moves the working directory to the new
/// root. Failure propagates before any build code runs.
pub fn enter(root: &Path) -> Result<SandboxGuard> {
    let old_root = File::open("/")
        .map_err(|e| Error::Permission(format!("cannot open host root: {}", e)))?;

    chroot_path(root)?;
    std::env::set_current_dir("/")
        .map_err(|e| Error::Permission(format!("chdir after chroot failed: {}", e)))?;

    info!("Entered build root at {}", root.display());
    Ok(SandboxGuard {
        old_root: Some(old_root),
    })
}

fn chroot_path(root: &Path) -> Result<()> {
    let c_root = CString::new(root.as_os_str().as_bytes())
        .map_err(|_| Error::Permission("root path contains a NUL byte".to_string()))?;
    if unsafe { libc::chroot(c_root.as_ptr()) } != 0 {
        return Err(Error::Permission(format!(
            "chroot into {} failed: {}",
            root.display(),
            io::Error::last_os_error()
        )));
    }
    Ok(())
}

impl SandboxGuard {
    /// Restore the original process root
    ///
    /// Consumes the guard; safe to call exactly once, and the drop
    /// handler covers error paths where it was never called.
    pub fn exit(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        let Some(old_root) = self.old_root.take() else {
            return Ok(());
        };

        if unsafe { libc::fchdir(old_root.as_raw_fd()) } != 0 {
            return Err(Error::Permission(format!(
                "fchdir to host root failed: {}",
                io::Error::last_os_error()
            )));
        }
        if unsafe { libc::chroot(c".".as_ptr()) } != 0 {
            return Err(Error::Permission(format!(
                "chroot back to host root failed: {}",
                io::Error::last_os_error()
            )));
        }

        debug!("Restored host root");
        Ok(())
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        if self.old_root.is_some() {
            if let Err(e) = self.restore() {
                warn!("Failed to restore host root: {}", e);
            }
        }
    }
}
