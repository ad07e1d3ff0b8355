// src/archive/mod.rs

//! Output archive creation
//!
//! Packs the staging directory (manifest plus built file tree) into a
//! single tar stream with zstd compression. The archive root corresponds
//! exactly to the staging directory contents: entries are relative, with
//! no absolute paths and no working-directory leakage.

use crate::error::Result;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Create `archive_path` from the full contents of `staging_dir`
pub fn pack(staging_dir: &Path, archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)?;
    let encoder = zstd::Encoder::new(file, 0)?;

    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", staging_dir)?;

    let encoder = builder.into_inner()?;
    encoder.finish()?;

    debug!(
        "Packed {} into {}",
        staging_dir.display(),
        archive_path.display()
    );
    Ok(())
}

/// Extract a tar+zstd archive into `dest`
pub fn unpack(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let decoder = zstd::Decoder::new(file)?;
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest)?;
    Ok(())
}
