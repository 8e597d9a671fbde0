//! Blob store interface and backends.
//!
//! The repository treats storage as an opaque name -> bytes map with three
//! operations: list by prefix, put a stream of known size, and resolve a
//! name to a URL. [`MemoryStorage`] keeps blobs in process; [`DirStorage`]
//! keeps them under a directory, one file per name.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// An opaque blob store.
pub trait BlobStore {
    /// Names starting with `prefix`, in ascending order.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Store exactly `size` bytes read from `content` under `name`,
    /// replacing any previous blob of that name.
    fn put(&self, name: &str, content: &mut dyn Read, size: u64) -> Result<()>;

    /// URL at which a stored blob can be fetched. Fails if `name` is absent.
    fn url(&self, name: &str) -> Result<String>;
}

impl<S: BlobStore + ?Sized> BlobStore for &S {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list(prefix)
    }

    fn put(&self, name: &str, content: &mut dyn Read, size: u64) -> Result<()> {
        (**self).put(name, content, size)
    }

    fn url(&self, name: &str) -> Result<String> {
        (**self).url(name)
    }
}

/// Reject names that cannot map onto a relative path.
pub fn validate_blob_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_blob_name(name, "name cannot be empty"));
    }
    if name.starts_with('/') || name.contains('\\') {
        return Err(Error::invalid_blob_name(
            name,
            "must be relative and use '/' separators",
        ));
    }
    if name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(Error::invalid_blob_name(
            name,
            "must not contain empty, '.' or '..' segments",
        ));
    }
    Ok(())
}

/// Read exactly `size` bytes, failing if the stream is shorter.
fn read_exact_size(name: &str, content: &mut dyn Read, size: u64) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    content.take(size).read_to_end(&mut data)?;
    if data.len() as u64 != size {
        return Err(Error::size_mismatch(name, size, data.len() as u64));
    }
    Ok(data)
}

/// In-process blob store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of a stored blob.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.borrow().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl BlobStore for MemoryStorage {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .borrow()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn put(&self, name: &str, content: &mut dyn Read, size: u64) -> Result<()> {
        validate_blob_name(name)?;
        let data = read_exact_size(name, content, size)?;
        self.blobs.borrow_mut().insert(name.to_string(), data);
        Ok(())
    }

    fn url(&self, name: &str) -> Result<String> {
        if self.blobs.borrow().contains_key(name) {
            Ok(format!("mem:///{}", name))
        } else {
            Err(Error::blob_not_found(name))
        }
    }
}

/// Directory-backed blob store.
///
/// A blob named `a/b/c` lives at `<root>/a/b/c`. Writes go through a
/// temporary file in the target directory and are persisted atomically.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Open (creating if needed) a blob directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path a blob name maps to.
    pub fn blob_path(&self, name: &str) -> Result<PathBuf> {
        validate_blob_name(name)?;
        Ok(name.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    fn name_of(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let segments = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(segments.join("/"))
    }
}

impl BlobStore for DirStorage {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .follow_links(false)
            .build();

        let mut names = Vec::new();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            // Skip in-flight temporary files and anything not UTF-8.
            let Some(name) = self.name_of(entry.path()) else {
                continue;
            };
            if name.rsplit('/').next().is_some_and(|f| f.starts_with(".tmp")) {
                continue;
            }
            if name.starts_with(prefix) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    fn put(&self, name: &str, content: &mut dyn Read, size: u64) -> Result<()> {
        let path = self.blob_path(name)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::invalid_blob_name(name, "no parent directory"))?;
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        let written = std::io::copy(&mut content.take(size), &mut temp_file)?;
        if written != size {
            return Err(Error::size_mismatch(name, size, written));
        }
        temp_file.flush()?;
        temp_file.persist(&path)?;

        Ok(())
    }

    fn url(&self, name: &str) -> Result<String> {
        let path = self.blob_path(name)?;
        if !path.is_file() {
            return Err(Error::blob_not_found(name));
        }
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_put_list_url() {
        let storage = MemoryStorage::new();
        storage.put("tools/a.tgz", &mut &b"aaa"[..], 3).unwrap();
        storage.put("tools/b.tgz", &mut &b"bb"[..], 2).unwrap();
        storage.put("other/c", &mut &b"c"[..], 1).unwrap();

        assert_eq!(
            storage.list("tools/").unwrap(),
            vec!["tools/a.tgz".to_string(), "tools/b.tgz".to_string()]
        );
        assert_eq!(storage.list("").unwrap().len(), 3);
        assert_eq!(storage.url("tools/a.tgz").unwrap(), "mem:///tools/a.tgz");
        assert_eq!(storage.get("tools/b.tgz").unwrap(), b"bb");
    }

    #[test]
    fn test_memory_url_missing() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.url("nope"),
            Err(Error::BlobNotFound { .. })
        ));
    }

    #[test]
    fn test_put_reads_declared_size_only() {
        let storage = MemoryStorage::new();
        storage.put("x", &mut &b"abcdef"[..], 4).unwrap();
        assert_eq!(storage.get("x").unwrap(), b"abcd");
    }

    #[test]
    fn test_put_short_stream_fails() {
        let storage = MemoryStorage::new();
        let err = storage.put("x", &mut &b"ab"[..], 4).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                declared: 4,
                actual: 2,
                ..
            }
        ));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_invalid_names() {
        for bad in ["", "/abs", "a//b", "../x", "a/./b", "a\\b", "a/"] {
            assert!(validate_blob_name(bad).is_err(), "{:?}", bad);
        }
        assert!(validate_blob_name("tools/juju-1.0.0-x.tgz").is_ok());
    }

    #[test]
    fn test_dir_put_and_url() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path().join("blobs")).unwrap();

        storage
            .put("tools/juju-1.0.0-x.tgz", &mut &b"payload"[..], 7)
            .unwrap();

        let path = storage.blob_path("tools/juju-1.0.0-x.tgz").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");

        let url = storage.url("tools/juju-1.0.0-x.tgz").unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("tools/juju-1.0.0-x.tgz"));
    }

    #[test]
    fn test_dir_put_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();

        storage.put("a", &mut &b"one"[..], 3).unwrap();
        storage.put("a", &mut &b"two!"[..], 4).unwrap();
        assert_eq!(fs::read(storage.blob_path("a").unwrap()).unwrap(), b"two!");
    }

    #[test]
    fn test_dir_short_stream_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();

        assert!(storage.put("tools/a", &mut &b"ab"[..], 10).is_err());
        assert!(storage.list("").unwrap().is_empty());
        assert!(matches!(
            storage.url("tools/a"),
            Err(Error::BlobNotFound { .. })
        ));
    }

    #[test]
    fn test_dir_list_prefix_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();

        for name in ["tools/juju-2.0.0-x.tgz", "tools/juju-1.0.0-x.tgz", "pkg/a"] {
            storage.put(name, &mut &b"z"[..], 1).unwrap();
        }

        assert_eq!(
            storage.list("tools/juju-").unwrap(),
            vec![
                "tools/juju-1.0.0-x.tgz".to_string(),
                "tools/juju-2.0.0-x.tgz".to_string()
            ]
        );
        assert_eq!(storage.list("").unwrap().len(), 3);
        assert!(storage.list("missing/").unwrap().is_empty());
    }
}
