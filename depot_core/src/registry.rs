//! Package registries: resolved reference -> stored blob and digest.

use crate::content::{ContentKind, PackageContent};
use crate::digest::ContentDigest;
use crate::error::{Error, Result};
use crate::package::{PackageRef, quote};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A published package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub reference: PackageRef,
    pub url: String,
    pub digest: ContentDigest,
    pub kind: ContentKind,
}

/// Record keeper for published packages.
///
/// `register` must be idempotent per reference: registering a reference that
/// is already present returns the existing record and changes nothing.
pub trait Registry {
    fn lookup(&self, reference: &PackageRef) -> Result<Option<PackageRecord>>;

    fn register(
        &self,
        content: &dyn PackageContent,
        reference: &PackageRef,
        url: &str,
        digest: ContentDigest,
    ) -> Result<PackageRecord>;
}

impl<G: Registry + ?Sized> Registry for &G {
    fn lookup(&self, reference: &PackageRef) -> Result<Option<PackageRecord>> {
        (**self).lookup(reference)
    }

    fn register(
        &self,
        content: &dyn PackageContent,
        reference: &PackageRef,
        url: &str,
        digest: ContentDigest,
    ) -> Result<PackageRecord> {
        (**self).register(content, reference, url, digest)
    }
}

fn require_resolved(reference: &PackageRef) -> Result<()> {
    if reference.revision() < 0 {
        return Err(Error::invalid_reference(
            reference.to_string(),
            "registered references need a concrete revision",
        ));
    }
    Ok(())
}

/// In-process registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RefCell<BTreeMap<PackageRef, PackageRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, ordered by reference.
    pub fn list(&self) -> Vec<PackageRecord> {
        self.records.borrow().values().cloned().collect()
    }
}

impl Registry for MemoryRegistry {
    fn lookup(&self, reference: &PackageRef) -> Result<Option<PackageRecord>> {
        Ok(self.records.borrow().get(reference).cloned())
    }

    fn register(
        &self,
        content: &dyn PackageContent,
        reference: &PackageRef,
        url: &str,
        digest: ContentDigest,
    ) -> Result<PackageRecord> {
        require_resolved(reference)?;
        let mut records = self.records.borrow_mut();
        let record = records
            .entry(reference.clone())
            .or_insert_with(|| PackageRecord {
                reference: reference.clone(),
                url: url.to_string(),
                digest,
                kind: content.kind(),
            });
        Ok(record.clone())
    }
}

/// Registry keeping one JSON file per reference.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    root: PathBuf,
}

impl FileRegistry {
    /// Open (creating if needed) a registry directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, reference: &PackageRef) -> PathBuf {
        self.root.join(format!("{}.json", quote(&reference.to_string())))
    }

    fn read_record(path: &Path) -> Result<PackageRecord> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All records, ordered by reference.
    pub fn list(&self) -> Result<Vec<PackageRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                records.push(Self::read_record(&path)?);
            }
        }
        records.sort_by(|a, b| a.reference.cmp(&b.reference));
        Ok(records)
    }
}

impl Registry for FileRegistry {
    fn lookup(&self, reference: &PackageRef) -> Result<Option<PackageRecord>> {
        let path = self.record_path(reference);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn register(
        &self,
        content: &dyn PackageContent,
        reference: &PackageRef,
        url: &str,
        digest: ContentDigest,
    ) -> Result<PackageRecord> {
        require_resolved(reference)?;
        let record = PackageRecord {
            reference: reference.clone(),
            url: url.to_string(),
            digest,
            kind: content.kind(),
        };

        let path = self.record_path(reference);
        let mut temp_file = tempfile::NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut temp_file, &record)?;
        temp_file.write_all(b"\n")?;
        temp_file.flush()?;

        // First writer wins; a racing second register gets the stored record.
        match temp_file.persist_noclobber(&path) {
            Ok(_) => Ok(record),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("{} already registered", reference);
                Self::read_record(&path)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ArchiveContent;
    use tempfile::TempDir;

    fn archive() -> ArchiveContent {
        ArchiveContent::new("/nonexistent/mysql-1.pkg", 1)
    }

    fn r(s: &str) -> PackageRef {
        PackageRef::parse(s).unwrap()
    }

    #[test]
    fn test_memory_register_lookup() {
        let registry = MemoryRegistry::new();
        let reference = r("cs/mysql-1");
        assert_eq!(registry.lookup(&reference).unwrap(), None);

        let digest = ContentDigest::of_bytes(b"mysql");
        let record = registry
            .register(&archive(), &reference, "mem:///cs_2f_mysql-1", digest)
            .unwrap();
        assert_eq!(record.digest, digest);
        assert_eq!(record.kind, ContentKind::Archive);
        assert_eq!(registry.lookup(&reference).unwrap(), Some(record));
    }

    #[test]
    fn test_memory_register_is_idempotent() {
        let registry = MemoryRegistry::new();
        let reference = r("cs/mysql-1");

        let first = registry
            .register(&archive(), &reference, "u1", ContentDigest::of_bytes(b"a"))
            .unwrap();
        let second = registry
            .register(&archive(), &reference, "u2", ContentDigest::of_bytes(b"b"))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_register_requires_revision() {
        let registry = MemoryRegistry::new();
        assert!(matches!(
            registry.register(&archive(), &r("cs/mysql"), "u", ContentDigest::of_bytes(b"")),
            Err(Error::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_file_register_lookup_list() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::open(temp_dir.path().join("registry")).unwrap();

        let a = r("cs/mysql-2");
        let b = r("cs/mysql-10");
        let digest = ContentDigest::of_bytes(b"x");
        registry.register(&archive(), &a, "ua", digest).unwrap();
        registry.register(&archive(), &b, "ub", digest).unwrap();

        let found = registry.lookup(&a).unwrap().unwrap();
        assert_eq!(found.url, "ua");
        assert_eq!(found.digest, digest);
        assert!(registry.lookup(&r("cs/mysql-3")).unwrap().is_none());

        let listed: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|rec| rec.reference.revision())
            .collect();
        assert_eq!(listed, vec![2, 10]);

        assert!(
            registry
                .root()
                .join("cs_2f_mysql-2.json")
                .is_file()
        );
    }

    #[test]
    fn test_file_register_first_writer_wins() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::open(temp_dir.path()).unwrap();
        let reference = r("cs/mysql-1");

        let first = registry
            .register(&archive(), &reference, "u1", ContentDigest::of_bytes(b"a"))
            .unwrap();
        let second = registry
            .register(&archive(), &reference, "u2", ContentDigest::of_bytes(b"b"))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn test_record_json_shape() {
        let record = PackageRecord {
            reference: r("cs/mysql-1"),
            url: "mem:///x".to_string(),
            digest: ContentDigest::of_bytes(b""),
            kind: ContentKind::Directory,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["reference"], "cs/mysql-1");
        assert_eq!(
            json["digest"],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(json["kind"], "directory");
    }
}
