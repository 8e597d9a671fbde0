//! Package content handles.
//!
//! A handle stands for the bytes of one package revision. Archive handles
//! point at a finished file; directory handles point at an unpacked package
//! with an on-disk `revision` marker and are turned into bytes by an
//! external [`Bundler`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the revision marker file inside a package directory.
pub const REVISION_FILE: &str = "revision";

/// Where a handle's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Unpacked directory; its revision can be bumped on disk.
    Directory,
    /// Finished archive; its revision is fixed.
    Archive,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Directory => "directory",
            ContentKind::Archive => "archive",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readable package bytes plus the revision they carry.
pub trait PackageContent {
    fn kind(&self) -> ContentKind;

    /// Revision recorded in the content itself.
    fn revision(&self) -> i64;

    /// Rewrite the revision marker. Only directory content supports this.
    fn set_disk_revision(&mut self, revision: i64) -> Result<()>;

    /// Append the complete content to `buf`, returning the byte count.
    fn read_into(&mut self, buf: &mut Vec<u8>) -> Result<u64>;
}

/// Turns a package directory into archive bytes.
pub trait Bundler {
    fn bundle(&self, dir: &Path, out: &mut dyn Write) -> Result<u64>;
}

/// A package archive file.
#[derive(Debug, Clone)]
pub struct ArchiveContent {
    path: PathBuf,
    revision: i64,
}

impl ArchiveContent {
    pub fn new(path: impl Into<PathBuf>, revision: i64) -> Self {
        Self {
            path: path.into(),
            revision,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PackageContent for ArchiveContent {
    fn kind(&self) -> ContentKind {
        ContentKind::Archive
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn set_disk_revision(&mut self, _revision: i64) -> Result<()> {
        Err(Error::upgrade_unsupported(self.path.display()))
    }

    fn read_into(&mut self, buf: &mut Vec<u8>) -> Result<u64> {
        let mut file = fs::File::open(&self.path)?;
        let n = file.read_to_end(buf)?;
        Ok(n as u64)
    }
}

/// An unpacked package directory.
pub struct DirContent {
    path: PathBuf,
    revision: i64,
    bundler: Arc<dyn Bundler>,
}

impl fmt::Debug for DirContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirContent")
            .field("path", &self.path)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl DirContent {
    /// Open a package directory, reading its revision marker.
    pub fn open(path: impl Into<PathBuf>, bundler: Arc<dyn Bundler>) -> Result<Self> {
        let path = path.into();
        let revision = read_revision_file(&path)?;
        Ok(Self {
            path,
            revision,
            bundler,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read `<dir>/revision`.
pub fn read_revision_file(dir: &Path) -> Result<i64> {
    let marker = dir.join(REVISION_FILE);
    let content = fs::read_to_string(&marker)?;
    let revision = content.trim().parse::<i64>().map_err(|e| {
        Error::invalid_reference(
            marker.display().to_string(),
            format!("bad revision marker: {}", e),
        )
    })?;
    if revision < 0 {
        return Err(Error::invalid_reference(
            marker.display().to_string(),
            "revision marker must not be negative",
        ));
    }
    Ok(revision)
}

impl PackageContent for DirContent {
    fn kind(&self) -> ContentKind {
        ContentKind::Directory
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn set_disk_revision(&mut self, revision: i64) -> Result<()> {
        let mut temp_file = tempfile::NamedTempFile::new_in(&self.path)?;
        writeln!(temp_file, "{}", revision)?;
        temp_file.flush()?;
        temp_file.persist(self.path.join(REVISION_FILE))?;
        self.revision = revision;
        Ok(())
    }

    fn read_into(&mut self, buf: &mut Vec<u8>) -> Result<u64> {
        self.bundler.bundle(&self.path, buf)
    }
}
