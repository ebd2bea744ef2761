// src/acquire/extract.rs

//! Archive extraction
//!
//! Tarballs are unpacked in-process. 7-Zip archives, and anything whose
//! extension is not recognized, go to the external archiver.

use crate::error::{Error, Result};
use crate::filesystem::sanitize_path;
use crate::process::{Invocation, ToolRunner, run_checked};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::{debug, info};

/// How an archive is unpacked, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.7z`, handled by the external archiver
    SevenZip,
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.tar.bz2` / `.tbz2`
    TarBz2,
    /// `.tar.xz` / `.txz`
    TarXz,
    /// Uncompressed `.tar`
    Tar,
    /// Unrecognized; the external archiver gets a try
    Other,
}

impl ArchiveKind {
    /// Detect the archive kind from a file name (case-insensitive)
    ///
    /// ```
    /// use libpack::acquire::ArchiveKind;
    ///
    /// assert_eq!(ArchiveKind::from_filename("zlib-1.3.1.tar.gz"), ArchiveKind::TarGz);
    /// assert_eq!(ArchiveKind::from_filename("hdf5.7z"), ArchiveKind::SevenZip);
    /// assert_eq!(ArchiveKind::from_filename("xerces.zip"), ArchiveKind::Other);
    /// ```
    pub fn from_filename(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.ends_with(".7z") {
            Self::SevenZip
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Self::TarBz2
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Self::TarXz
        } else if name.ends_with(".tar") {
            Self::Tar
        } else {
            Self::Other
        }
    }

    /// Whether this kind is unpacked in-process
    pub fn is_tarball(&self) -> bool {
        matches!(self, Self::TarGz | Self::TarBz2 | Self::TarXz | Self::Tar)
    }
}

/// Unpack a tar stream into `dest`, refusing members that would land outside it
///
/// Returns the number of members written.
pub fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<usize> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut count = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let member = entry.path()?.into_owned();

        // Pax headers and the like carry no path worth keeping
        let relative = match sanitize_path(&member) {
            Ok(p) => p,
            Err(Error::InvalidPath(_)) => continue,
            Err(_) => {
                return Err(Error::PathTraversal(format!(
                    "archive member {} escapes {}",
                    member.display(),
                    dest.display()
                )));
            }
        };

        if let Some(link) = entry.link_name()?
            && entry.header().entry_type().is_hard_link()
        {
            sanitize_path(&link)?;
        }

        if entry.unpack_in(dest)? {
            count += 1;
        } else {
            debug!("Skipped archive member {}", relative.display());
        }
    }

    Ok(count)
}

fn open_tarball(archive: &Path, kind: ArchiveKind) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(archive)?);
    Ok(match kind {
        ArchiveKind::TarGz => Box::new(flate2::read::GzDecoder::new(file)),
        ArchiveKind::TarBz2 => Box::new(bzip2::read::BzDecoder::new(file)),
        ArchiveKind::TarXz => Box::new(xz2::read::XzDecoder::new(file)),
        _ => Box::new(file),
    })
}

/// Extract `archive` into `dest`
///
/// `archiver` is the 7-Zip compatible executable used for `.7z` files and
/// as a fallback for unknown extensions. It is run with `dest` as its
/// working directory.
pub fn extract(archive: &Path, dest: &Path, archiver: &Path, runner: &dyn ToolRunner) -> Result<()> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string());
    let kind = ArchiveKind::from_filename(&name);
    let failed = |reason: String| Error::DecompressFailed {
        name: name.clone(),
        reason,
    };

    fs::create_dir_all(dest)?;

    if kind.is_tarball() {
        let reader = open_tarball(archive, kind).map_err(|e| failed(e.to_string()))?;
        let count = unpack_tar(reader, dest).map_err(|e| failed(e.to_string()))?;
        info!("Extracted {} entries from {}", count, name);
        return Ok(());
    }

    if kind == ArchiveKind::Other {
        debug!("Unrecognized archive type for {}, trying {}", name, archiver.display());
    }

    let invocation = Invocation::new(archiver, dest).args([
        "x".to_string(),
        "-y".to_string(),
        archive.display().to_string(),
    ]);
    run_checked(runner, &invocation, |output| failed(output.combined())).map_err(|e| match e {
        Error::ToolFailed { reason, .. } => failed(reason),
        other => other,
    })?;

    info!("Extracted {} with {}", name, archiver.display());
    Ok(())
}
