//! Package source repositories.

use crate::content::{ArchiveContent, Bundler, DirContent, PackageContent, read_revision_file};
use crate::error::{Error, Result};
use crate::package::{PackageRef, quote};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File extension of package archives in a local repository.
pub const ARCHIVE_EXTENSION: &str = "pkg";

/// Where package content is fetched from.
pub trait SourceRepository {
    /// Highest available revision of the referenced package.
    fn latest(&self, reference: &PackageRef) -> Result<i64>;

    /// Content of the referenced revision.
    fn get(&self, reference: &PackageRef) -> Result<Box<dyn PackageContent>>;
}

impl<R: SourceRepository + ?Sized> SourceRepository for &R {
    fn latest(&self, reference: &PackageRef) -> Result<i64> {
        (**self).latest(reference)
    }

    fn get(&self, reference: &PackageRef) -> Result<Box<dyn PackageContent>> {
        (**self).get(reference)
    }
}

/// Packages on the local filesystem.
///
/// Layout, with the namespace quoted into a single path segment:
///
/// ```text
/// <root>/<namespace>/<name>-<revision>.pkg   archive
/// <root>/<namespace>/<name>/revision         directory (needs a bundler)
/// ```
pub struct LocalRepository {
    root: PathBuf,
    bundler: Option<Arc<dyn Bundler>>,
}

impl std::fmt::Debug for LocalRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRepository")
            .field("root", &self.root)
            .field("directories", &self.bundler.is_some())
            .finish()
    }
}

impl LocalRepository {
    /// Repository serving archives only.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bundler: None,
        }
    }

    /// Also serve package directories, bundled with `bundler`.
    pub fn with_bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = Some(bundler);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, reference: &PackageRef) -> PathBuf {
        self.root.join(quote(reference.namespace()))
    }

    fn archive_path(&self, reference: &PackageRef, revision: i64) -> PathBuf {
        self.namespace_dir(reference).join(format!(
            "{}-{}.{}",
            reference.name(),
            revision,
            ARCHIVE_EXTENSION
        ))
    }

    fn dir_path(&self, reference: &PackageRef) -> PathBuf {
        self.namespace_dir(reference).join(reference.name())
    }

    /// Revision of the package directory, if directories are served and it exists.
    fn dir_revision(&self, reference: &PackageRef) -> Result<Option<i64>> {
        if self.bundler.is_none() {
            return Ok(None);
        }
        let dir = self.dir_path(reference);
        if !dir.is_dir() {
            return Ok(None);
        }
        read_revision_file(&dir).map(Some)
    }

    fn archive_revisions(&self, reference: &PackageRef) -> Result<Vec<i64>> {
        let ns_dir = self.namespace_dir(reference);
        if !ns_dir.is_dir() {
            return Ok(Vec::new());
        }

        let stem_prefix = format!("{}-", reference.name());
        let mut revisions = Vec::new();
        for entry in fs::read_dir(&ns_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(rev) = file_name
                .strip_prefix(stem_prefix.as_str())
                .and_then(|rest| rest.strip_suffix(&format!(".{}", ARCHIVE_EXTENSION)))
            else {
                continue;
            };
            if rev.is_empty() || !rev.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(rev) = rev.parse::<i64>() {
                revisions.push(rev);
            }
        }
        Ok(revisions)
    }
}

impl SourceRepository for LocalRepository {
    fn latest(&self, reference: &PackageRef) -> Result<i64> {
        let mut revisions = self.archive_revisions(reference)?;
        revisions.extend(self.dir_revision(reference)?);
        let latest = revisions
            .into_iter()
            .max()
            .ok_or_else(|| Error::package_not_found(reference.path()))?;
        debug!("latest revision of {} is {}", reference.path(), latest);
        Ok(latest)
    }

    fn get(&self, reference: &PackageRef) -> Result<Box<dyn PackageContent>> {
        let revision = if reference.is_latest() {
            self.latest(reference)?
        } else {
            reference.revision()
        };

        if let Some(bundler) = &self.bundler
            && self.dir_revision(reference)? == Some(revision)
        {
            let content = DirContent::open(self.dir_path(reference), Arc::clone(bundler))?;
            return Ok(Box::new(content));
        }

        let path = self.archive_path(reference, revision);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Box::new(ArchiveContent::new(path, revision))),
            Ok(meta) => Err(Error::unknown_content_kind(
                reference.with_revision(revision),
                format!("{} is a {:?}", path.display(), meta.file_type()),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::package_not_found(reference.with_revision(revision)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
