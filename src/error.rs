// src/error.rs

//! Central error type for the build pipeline
//!
//! Every component returns errors through this enum so the pipeline
//! orchestrator can map the first fatal failure into a single top-level
//! error, run teardown, and surface it to the caller.

use thiserror::Error;

/// Errors that can occur while building a package
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid host-side configuration (home directory,
    /// repository config, shell interpreter)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Syntax or runtime failure in the build script
    #[error("Script error: {0}")]
    Script(String),

    /// A required script global is absent or has the wrong shape
    #[error("Missing or malformed required field: {0}")]
    MissingField(String),

    /// Bind mount or unmount failure
    #[error("Mount error: {0}")]
    Mount(String),

    /// Entering or leaving the build root failed
    #[error("Permission error: {0}")]
    Permission(String),

    /// A subprocess (shell command, dependency installer) failed
    #[error("Process error: {0}")]
    Process(String),

    /// HTTP download failure
    #[error("Download error: {0}")]
    Download(String),

    /// Manifest encoding failure
    #[error("Manifest serialization failed: {0}")]
    Serialization(#[from] toml::ser::Error),

    /// Filesystem create/read/write/remove failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<mlua::Error> for Error {
    fn from(e: mlua::Error) -> Self {
        Error::Script(e.to_string())
    }
}

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_the_field() {
        let err = Error::MissingField("version".to_string());
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_lua_error_maps_to_script() {
        let lua = mlua::Lua::new();
        let err = lua.load("this is not lua").exec().unwrap_err();
        let err: Error = err.into();
        assert!(matches!(err, Error::Script(_)));
    }
}
