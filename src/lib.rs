// src/lib.rs

//! apkgbuild
//!
//! Builds APKG packages inside a disposable, isolated root filesystem
//! driven by a Lua build script, and emits a tar+zstd archive containing
//! the finished package tree and its `package.toml` manifest.
//!
//! # Architecture
//!
//! - Build root: a uniquely named chroot under the system temp dir,
//!   created per build and removed on every exit path
//! - Script host: an embedded Lua interpreter exposing `exec` and
//!   `download` to the build script
//! - Manifest: the script's declared globals validated into a typed
//!   package descriptor
//! - Pipeline: sequences root setup, dependency installation, the
//!   sandboxed build, extraction, and archiving, with one shared
//!   teardown path

pub mod archive;
pub mod config;
mod error;
pub mod installer;
pub mod manifest;
pub mod pipeline;
pub mod sandbox;
pub mod script;

pub use config::BuildConfig;
pub use error::{Error, Result};
pub use installer::{DependencyInstaller, NoopInstaller, PaxInstaller};
pub use manifest::{Dependencies, Hooks, Package, PackageRoot};
pub use pipeline::Pipeline;
pub use script::ScriptHost;
